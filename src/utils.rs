//! # Utility Functions Module
//!
//! Small helpers for building and logging external command lines.

use std::path::Path;

/// Converts any iterable of string-like items to `Vec<String>`.
///
/// ```rust
/// use screenshot_uploader::utils::to_string_vec;
///
/// let quality = 85;
/// let args = to_string_vec(["-quality", &quality.to_string(), "in.png", "out.jpg"]);
/// assert_eq!(args[1], "85");
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Builds an argument vector from heterogeneous items.
///
/// ```rust
/// use screenshot_uploader::args;
///
/// let args = args!["-resize", "640x480>", 85];
/// assert_eq!(args, vec!["-resize", "640x480>", "85"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}

/// Renders a command line for the `exec:` debug log, quoting arguments with spaces.
pub fn format_command(program: &Path, args: &[String]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        if arg.contains(char::is_whitespace) || arg.is_empty() {
            line.push('"');
            line.push_str(arg);
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}
