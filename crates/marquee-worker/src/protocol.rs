//! Terminal message emission.

use std::io::Write;

use marquee_core::WorkerOutcome;

/// Write `outcome` as the single protocol line and flush.
///
/// Taking the outcome by value keeps a second emission from compiling at the
/// call site.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub fn emit(outcome: WorkerOutcome, out: &mut impl Write) -> anyhow::Result<()> {
    let line = outcome.to_line()?;
    writeln!(out, "{line}")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_exactly_one_newline_terminated_line() -> anyhow::Result<()> {
        let mut buffer = Vec::new();
        emit(WorkerOutcome::Success { message_locator: 5 }, &mut buffer)?;
        let text = String::from_utf8(buffer)?;
        assert_eq!(text, "{\"status\":\"success\",\"message_locator\":5}\n");
        assert_eq!(text.lines().count(), 1);
        Ok(())
    }
}
