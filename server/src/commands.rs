//! Console commands

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use cloudtray_core::{ConfigPatch, Zone};

pub const HELP: &str = "\
Commands:
  <n> | click <n>        copy the export template of slot n
  list                   show the visible slots
  set <field> <value>    change a setting; fields: organization, access-key,
                         secret-key, view-mask, copy-mask, check-interval,
                         ping-interval, zones (comma separated)
  reset                  restore default settings
  import <path>          load settings from a file
  export <path>          write settings to a file
  save                   write settings to the settings file
  refresh                probe every server now
  help                   this text
  quit                   save and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Click(usize),
    List,
    Set(ConfigPatch),
    Reset,
    Import(PathBuf),
    Export(PathBuf),
    Save,
    Refresh,
    Help,
    Quit,
}

/// Parse one console line
pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "" => bail!("Empty command"),
        "click" => Command::Click(parse_index(rest)?),
        "list" | "ls" => Command::List,
        "set" => Command::Set(parse_setting(rest)?),
        "reset" => Command::Reset,
        "import" => Command::Import(parse_path(rest)?),
        "export" => Command::Export(parse_path(rest)?),
        "save" => Command::Save,
        "refresh" => Command::Refresh,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ if rest.is_empty() && word.bytes().all(|b| b.is_ascii_digit()) => {
            Command::Click(parse_index(word)?)
        }
        other => bail!("Unknown command: {} (try `help`)", other),
    };
    Ok(command)
}

fn parse_index(value: &str) -> Result<usize> {
    value
        .parse()
        .with_context(|| format!("Invalid slot number: {:?}", value))
}

fn parse_path(value: &str) -> Result<PathBuf> {
    if value.is_empty() {
        bail!("Missing file path");
    }
    Ok(PathBuf::from(value))
}

fn parse_seconds(value: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("Invalid number of seconds: {:?}", value))
}

fn parse_zones(value: &str) -> Result<Vec<String>> {
    let zones = value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| Ok(name.parse::<Zone>()?.as_str().to_string()))
        .collect::<Result<Vec<_>>>()?;

    if zones.is_empty() {
        bail!("At least one zone is required");
    }
    Ok(zones)
}

/// `<field> <value>`; text values may contain spaces and may be empty
fn parse_setting(rest: &str) -> Result<ConfigPatch> {
    let (field, value) = match rest.split_once(char::is_whitespace) {
        Some((field, value)) => (field, value.trim()),
        None => (rest, ""),
    };

    let mut patch = ConfigPatch::default();
    match field.to_ascii_lowercase().as_str() {
        "organization" => patch.organization_id = Some(value.to_string()),
        "access-key" => patch.access_key = Some(value.to_string()),
        "secret-key" => patch.secret_key = Some(value.to_string()),
        "view-mask" => patch.view_mask = Some(value.to_string()),
        "copy-mask" => patch.copy_mask = Some(value.to_string()),
        "check-interval" => patch.check_interval = Some(parse_seconds(value)?),
        "ping-interval" => patch.ping_interval = Some(parse_seconds(value)?),
        "zones" => patch.zones = Some(parse_zones(value)?),
        "" => bail!("Missing setting name"),
        other => bail!("Unknown setting: {}", other),
    }
    Ok(patch)
}
