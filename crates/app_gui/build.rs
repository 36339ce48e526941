use std::env;

fn main() {
    let version = env::var("BLOODGROUP_VERSION")
        .unwrap_or_else(|_| env::var("CARGO_PKG_VERSION").unwrap());
    println!("cargo:rerun-if-env-changed=BLOODGROUP_VERSION");
    println!("cargo:rustc-env=BLOODGROUP_VERSION={version}");
}
