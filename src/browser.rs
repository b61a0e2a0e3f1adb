use crate::runner::CommandRunner;
use std::io::{self, Write};

// xdg-open on Linux, open on macOS, rundll32 on Windows
const LAUNCHERS: [(&str, &[&str]); 3] = [
    ("xdg-open", &[]),
    ("open", &[]),
    ("rundll32", &["url.dll,FileProtocolHandler"]),
];

/// Opens `url` in the default browser, or tells the user to do it when no launcher starts.
pub fn open_browser<R, W>(runner: &R, url: &str, out: &mut W) -> io::Result<()>
where
    R: CommandRunner + ?Sized,
    W: Write,
{
    for (program, args) in LAUNCHERS {
        let args: Vec<&str> = args.iter().copied().chain([url]).collect();
        match runner.spawn(program, &args) {
            Ok(()) => return Ok(()),
            Err(err) => tracing::debug!("{} unavailable: {}", program, err),
        }
    }
    writeln!(out, "Please open your browser and navigate to: {}", url)
}
