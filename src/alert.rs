//! Modal message boxes: usage, invalid command, failure reports.
//!
//! This is a GUI-subsystem tool with no console, so every user-visible
//! message goes through MessageBoxW. Failure reports render the OS's own
//! error text via FormatMessageW next to the numeric code.

use windows::Win32::System::Diagnostics::Debug::{
    FormatMessageW, FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    MessageBoxW, MB_ICONERROR, MB_ICONINFORMATION, MB_ICONWARNING, MB_OK, MESSAGEBOX_STYLE,
};
use windows::core::{PCWSTR, PWSTR};

use crate::error::TaskError;
use crate::util::encode_wide;

const CAPTION: &str = "Background Task";

// MAKELANGID(LANG_NEUTRAL, SUBLANG_DEFAULT)
const LANGID_NEUTRAL_DEFAULT: u32 = 0x0400;

const USAGE: &str = "Too few arguments to run task.\n\nSyntax is\n\n\
                     background-task.exe [hidecommand] task <parameters>";

fn show(text: &str, style: MESSAGEBOX_STYLE) {
    let text_wide = encode_wide(text);
    let caption_wide = encode_wide(CAPTION);
    unsafe {
        MessageBoxW(
            None,
            PCWSTR(text_wide.as_ptr()),
            PCWSTR(caption_wide.as_ptr()),
            MB_OK | style,
        );
    }
}

/// Look up the system's human-readable text for a Win32 error code.
fn os_error_message(code: u32) -> String {
    let mut buf = [0u16; 512];
    let len = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
            None,
            code,
            LANGID_NEUTRAL_DEFAULT,
            PWSTR(buf.as_mut_ptr()),
            buf.len() as u32,
            None,
        )
    };
    String::from_utf16_lossy(&buf[..len as usize])
        .trim_end()
        .to_string()
}

fn compose_failure_text(task: &str, code: u32, os_message: &str) -> String {
    format!("Unable to {}. Error code {}: {}", task, code, os_message)
}

/// Report a launch failure: the failed operation, the numeric code and
/// the OS's own description of it.
pub fn failure(error: &TaskError) {
    let text = compose_failure_text(error.task, error.code, &os_error_message(error.code));
    show(&text, MB_ICONERROR);
}

/// There is no OS code to report here: the arguments arrived, they just
/// are not valid Unicode. So no "Error code N" in this one message.
const TOKENIZE_FAILURE_TEXT: &str =
    "Unable to parse the command line: arguments are not valid Unicode.";

/// Report that the raw command line could not be tokenized.
pub fn tokenize_failure() {
    show(TOKENIZE_FAILURE_TEXT, MB_ICONERROR);
}

pub fn usage() {
    show(USAGE, MB_ICONINFORMATION);
}

pub fn invalid_command(command: &str) {
    let text = format!(
        "Sorry, the command {} is invalid. Try \"help\" or no arguments for help.",
        command
    );
    show(&text, MB_ICONWARNING);
}
