//! Command-line assembly for CreateProcessW.
//!
//! Each token is quoted if and only if it contains whitespace. Embedded
//! double quotes are NOT escaped: the correct escaping convention depends
//! on how the target application parses its command line, so arguments are
//! assumed quote-free by convention. This is a documented limitation, not
//! something to silently fix here.

/// Quote a single token if it contains whitespace.
fn quote_token(token: &str) -> String {
    if token.contains(char::is_whitespace) {
        format!("\"{}\"", token)
    } else {
        token.to_string()
    }
}

/// Build the command line passed to CreateProcessW: the executable path
/// followed by each extra argument, space-separated, quoted per token.
pub fn build(executable: &str, args: &[String]) -> String {
    let mut cmdline = quote_token(executable);
    for arg in args {
        cmdline.push(' ');
        cmdline.push_str(&quote_token(arg));
    }
    cmdline
}
