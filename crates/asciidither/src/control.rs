use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use params::{parse_assignment, ParamName, ParameterChannel, ValidationError};
use tracing::{debug, info, warn};

/// Applies one control line. Blank lines and `#` comments are skipped.
pub fn apply_line(
    channel: &ParameterChannel,
    line: &str,
) -> Result<Option<(ParamName, f32)>, ValidationError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (param, value) = parse_assignment(line)?;
    channel.set(param, value)?;
    Ok(Some((param, value)))
}

/// Feeds `name=value` lines from `reader` into the channel until EOF.
///
/// Rejected lines are logged and leave the parameters untouched.
pub fn pump<R: BufRead>(reader: R, channel: &ParameterChannel) -> usize {
    let mut applied = 0;
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "stopped reading control input");
                break;
            }
        };
        match apply_line(channel, &line) {
            Ok(Some((param, value))) => {
                debug!(%param, value, "parameter updated from stdin");
                applied += 1;
            }
            Ok(None) => {}
            Err(err) => warn!(line = %line.trim(), error = %err, "rejected control line"),
        }
    }
    applied
}

/// Reads control lines from stdin on a background thread.
///
/// The thread is detached; it ends at EOF or with the process.
pub fn spawn_stdin_control(channel: ParameterChannel) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("asciidither-stdin".into())
        .spawn(move || {
            info!("reading parameter updates from stdin");
            let applied = pump(io::stdin().lock(), &channel);
            debug!(applied, "stdin control closed");
        })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use params::{EffectMode, EffectParameters};

    use super::*;

    #[test]
    fn applies_valid_lines_and_skips_the_rest() {
        let channel = ParameterChannel::new(EffectParameters::default()).unwrap();
        let input = "charSize=12\n\n# comment\nmode=dither\nditherSize=3\nbogus=1\n";
        let applied = pump(Cursor::new(input), &channel);

        assert_eq!(applied, 2);
        let snapshot = channel.snapshot();
        assert_eq!(snapshot.char_size, 12.0);
        assert_eq!(snapshot.mode, EffectMode::Dither);
        assert_eq!(snapshot.dither_size.size(), 4);
    }

    #[test]
    fn rejected_line_keeps_previous_value() {
        let channel = ParameterChannel::new(EffectParameters::default()).unwrap();
        assert!(apply_line(&channel, "ditherIntensity=1.5").is_err());
        assert_eq!(channel.snapshot().dither_intensity, 0.5);
    }
}
