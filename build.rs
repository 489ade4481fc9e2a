fn main() {
    // git HEADが変わったらバージョン文字列を再生成
    println!("cargo:rerun-if-changed=.git/HEAD");

    let described = std::process::Command::new("git")
        .args(["describe", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());

    let pkg = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let version = match described {
        Some(rev) if !rev.is_empty() => format!("{pkg}+{rev}"),
        _ => pkg,
    };

    println!("cargo:rustc-env=RIG_BUILD_VERSION={}", version);
}
