//! Browser UI, compiled into the binary.

pub const INDEX_HTML: &str = include_str!("../assets/index.html");
pub const MAIN_JS: &str = include_str!("../assets/main.js");
pub const MAIN_CSS: &str = include_str!("../assets/main.css");
