//! # Command Line Rendering
//!
//! Renders process arguments back into a single shell-like line, the form in
//! which a run records how it was launched. Arguments that a shell would split
//! or interpret are single-quoted; embedded single quotes use the `'\''` idiom.

/// Joins `args` into one command line, quoting where needed.
///
/// # Example
/// ```rust
/// use flowrun_util::command_line::render_command_line;
///
/// let line = render_command_line(["flowrun", "run", "main.nf", "--greeting", "Hello world"]);
/// assert_eq!(line, "flowrun run main.nf --greeting 'Hello world'");
/// ```
pub fn render_command_line<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|arg| quote_arg(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quotes a single argument when it contains whitespace, quotes or shell metacharacters.
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    if !arg.bytes().any(needs_quoting) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn needs_quoting(byte: u8) -> bool {
    byte.is_ascii_whitespace()
        || matches!(
            byte,
            b'\'' | b'"' | b'\\' | b'$' | b'`' | b'*' | b'?' | b'[' | b']' | b'{' | b'}' | b'(' | b')' | b'<' | b'>' | b'|' | b'&'
                | b';' | b'#' | b'~' | b'!'
        )
}
