//! Version command implementation.

/// Print `dclient version <v> (<build>)`.
pub fn execute() {
    println!("{}", version_line());
}

fn version_line() -> String {
    let build = if cfg!(debug_assertions) {
        "dev"
    } else {
        "release"
    };
    format!("dclient version {} ({build})", env!("CARGO_PKG_VERSION"))
}
