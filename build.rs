//! Embeds the build timestamp consumed by [`Banner`](src/governor/report.rs).

fn main() {
    // Same shape as a C compiler's __DATE__ " " __TIME__ pair.
    let stamp = chrono::Utc::now().format("%b %e %Y %H:%M:%S").to_string();
    println!("cargo:rustc-env=WEIR_BUILD_TIMESTAMP={stamp}");
    println!("cargo:rerun-if-changed=build.rs");
}
