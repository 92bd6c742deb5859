//! User-crontab implementation of the deferred-execution contract.
//!
//! Managed entries are ordinary crontab lines with a trailing `# tag`
//! marker. Everything else in the crontab is preserved verbatim across
//! commits. The table is loaded lazily from `crontab -l`, mutated in
//! memory, and written back whole through `crontab -`.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use tracing::debug;

use portgate_core::{CoreError, CronEntry, CronSpec, DeferredExecutor};

#[derive(Debug, Clone)]
enum Line {
    Foreign(String),
    Managed(CronEntry),
}

pub struct CrontabExecutor {
    crontab_bin: String,
    // None until first loaded from `crontab -l`.
    lines: Mutex<Option<Vec<Line>>>,
}

impl CrontabExecutor {
    pub fn new(crontab_bin: impl Into<String>) -> Self {
        Self {
            crontab_bin: crontab_bin.into(),
            lines: Mutex::new(None),
        }
    }

    fn read_table(&self) -> Result<Vec<Line>, CoreError> {
        let output = Command::new(&self.crontab_bin)
            .arg("-l")
            .output()
            .map_err(|e| CoreError::deferred(format!("running {} -l: {e}", self.crontab_bin)))?;
        // A missing crontab exits non-zero; treat it as empty.
        if !output.status.success() {
            debug!("no existing crontab");
            return Ok(Vec::new());
        }
        let raw = String::from_utf8_lossy(&output.stdout);
        Ok(raw
            .lines()
            .map(|line| match parse_line(line) {
                Some(entry) => Line::Managed(entry),
                None => Line::Foreign(line.to_owned()),
            })
            .collect())
    }

    fn with_lines<T>(
        &self,
        f: impl FnOnce(&mut Vec<Line>) -> T,
    ) -> Result<T, CoreError> {
        let mut guard = self
            .lines
            .lock()
            .map_err(|_| CoreError::deferred("crontab state lock poisoned"))?;
        if guard.is_none() {
            *guard = Some(self.read_table()?);
        }
        match guard.as_mut() {
            Some(lines) => Ok(f(lines)),
            None => Err(CoreError::deferred("crontab state unavailable")),
        }
    }
}

impl DeferredExecutor for CrontabExecutor {
    fn schedule(&self, entry: CronEntry) -> Result<(), CoreError> {
        self.with_lines(|lines| lines.push(Line::Managed(entry)))
    }

    fn entries(&self) -> Result<Vec<CronEntry>, CoreError> {
        self.with_lines(|lines| {
            lines
                .iter()
                .filter_map(|line| match line {
                    Line::Managed(entry) => Some(entry.clone()),
                    Line::Foreign(_) => None,
                })
                .collect()
        })
    }

    fn remove_tagged(&self, tag_prefix: &str) -> Result<usize, CoreError> {
        self.with_lines(|lines| {
            let before = lines.len();
            lines.retain(|line| match line {
                Line::Managed(entry) => !entry.tag.starts_with(tag_prefix),
                Line::Foreign(_) => true,
            });
            before - lines.len()
        })
    }

    fn commit(&self) -> Result<(), CoreError> {
        let table = self.with_lines(|lines| {
            let mut out = lines
                .iter()
                .map(|line| match line {
                    Line::Foreign(raw) => raw.clone(),
                    Line::Managed(entry) => render_line(entry),
                })
                .collect::<Vec<_>>()
                .join("\n");
            if !out.is_empty() {
                out.push('\n');
            }
            out
        })?;

        let mut child = Command::new(&self.crontab_bin)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CoreError::deferred(format!("running {} -: {e}", self.crontab_bin)))?;
        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(table.as_bytes())
                .map_err(|e| CoreError::deferred(format!("writing crontab: {e}")))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| CoreError::deferred(format!("waiting for {}: {e}", self.crontab_bin)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::deferred(format!(
                "crontab rejected the new table: {}",
                stderr.trim()
            )));
        }
        debug!("crontab committed");
        Ok(())
    }
}

fn render_line(entry: &CronEntry) -> String {
    format!("{} {} # {}", entry.spec, entry.command, entry.tag)
}

// Splits off one whitespace-delimited field, keeping the remainder as a
// raw slice of the input.
fn split_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let end = s.find(char::is_whitespace)?;
    Some((&s[..end], &s[end..]))
}

/// Parse a crontab line as one of ours: five time fields (weekday `*`),
/// a command, and a trailing `# tag` marker. Anything else is foreign.
///
/// The command is kept as the raw span between the weekday field and the
/// tag marker: quoted arguments may legitimately contain runs of spaces,
/// so the line is never re-tokenized.
fn parse_line(line: &str) -> Option<CronEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (body, tag) = line.rsplit_once(" # ")?;
    let tag = tag.trim();
    // Tags are plain identifiers; a quote or space here means the marker
    // was found inside a quoted argument of a foreign line.
    if tag.is_empty()
        || !tag
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return None;
    }

    let (minute, rest) = split_field(body)?;
    let (hour, rest) = split_field(rest)?;
    let (day, rest) = split_field(rest)?;
    let (month, rest) = split_field(rest)?;
    let (weekday, command) = split_field(rest)?;
    if weekday != "*" {
        return None;
    }
    let command = command.trim();
    if command.is_empty() {
        return None;
    }

    Some(CronEntry {
        tag: tag.to_owned(),
        spec: CronSpec {
            minute: minute.parse().ok()?,
            hour: hour.parse().ok()?,
            day: day.parse().ok()?,
            month: month.parse().ok()?,
        },
        command: command.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn managed_line_round_trips() {
        let entry = CronEntry {
            tag: "portgate_abc123_start".to_owned(),
            spec: CronSpec {
                minute: 30,
                hour: 14,
                day: 23,
                month: 8,
            },
            command: "/usr/local/bin/portgate port disable 10.0.0.1 private 3,4 --version 2"
                .to_owned(),
        };
        let line = render_line(&entry);
        assert_eq!(
            line,
            "30 14 23 8 * /usr/local/bin/portgate port disable 10.0.0.1 private 3,4 --version 2 # portgate_abc123_start"
        );
        assert_eq!(parse_line(&line).unwrap(), entry);
    }

    #[test]
    fn quoted_arguments_survive_the_round_trip() {
        let entry = CronEntry {
            tag: "portgate_abc123_end".to_owned(),
            spec: CronSpec {
                minute: 0,
                hour: 8,
                day: 23,
                month: 8,
            },
            command: "/usr/local/bin/portgate port enable 'lab  switch # 1' private 3"
                .to_owned(),
        };
        let parsed = parse_line(&render_line(&entry)).unwrap();
        // Doubled spaces and the marker-lookalike inside the quotes are
        // untouched, and the trailing tag still wins.
        assert_eq!(parsed, entry);
    }

    #[test]
    fn foreign_lines_are_not_claimed() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("# a comment"), None);
        assert_eq!(parse_line("MAILTO=ops@example.org"), None);
        // Recurring schedule (wildcard fields) is not one of ours.
        assert_eq!(parse_line("*/5 * * * * /usr/bin/backup # nightly"), None);
        // Weekday restriction is not one of ours.
        assert_eq!(parse_line("0 8 23 8 1 /usr/bin/thing # tag"), None);
        // No tag marker.
        assert_eq!(parse_line("0 8 23 8 * /usr/bin/thing"), None);
        // Untagged line whose quoted argument contains the marker text.
        assert_eq!(parse_line("0 8 23 8 * /usr/bin/echo 'x # note'"), None);
    }
}
