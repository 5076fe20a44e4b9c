//! Parser for `makemkvcon -r` (robot mode) output.
//!
//! Robot output is one record per line, `KIND:field,field,...`, where string
//! fields are double quoted and may contain commas. Only the records needed
//! to describe titles are interpreted:
//!
//! - `TCOUNT:<n>` number of titles
//! - `CINFO:<attr>,<code>,"<value>"` disc attributes
//! - `TINFO:<title>,<attr>,<code>,"<value>"` title attributes
//! - `MSG:<code>,<flags>,<count>,"<message>",...` log messages

use super::{DiscInfo, TitleInfo, ToolError};
use std::collections::BTreeMap;

/// Attribute ids from the MakeMKV `apdefs.h` item table.
mod attr {
    pub const NAME: u32 = 2;
    pub const CHAPTER_COUNT: u32 = 8;
    pub const DURATION: u32 = 9;
    pub const DISK_SIZE_BYTES: u32 = 11;
    pub const SOURCE_FILE_NAME: u32 = 16;
    pub const OUTPUT_FILE_NAME: u32 = 27;
    pub const TREE_INFO: u32 = 30;
}

/// Splits the part after `KIND:` into fields, unquoting string fields.
pub(crate) fn split_fields(rest: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = rest.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Splits a robot line into its record kind and fields.
fn split_record(line: &str) -> Option<(&str, Vec<String>)> {
    let (kind, rest) = line.trim_end().split_once(':')?;
    Some((kind, split_fields(rest)))
}

/// Extracts the human-readable text of every `MSG` record.
pub fn parse_messages(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(split_record)
        .filter(|(kind, _)| *kind == "MSG")
        .filter_map(|(_, fields)| fields.get(3).cloned())
        .collect()
}

/// Parses the output of `makemkvcon -r info` into a [`DiscInfo`].
///
/// Fails if the output contains neither a `TCOUNT` nor any `TINFO` record,
/// which is what the tool prints when it could not open the image.
pub fn parse_info_output(output: &str) -> Result<DiscInfo, ToolError> {
    let mut name = None;
    let mut title_count = None;
    let mut titles: BTreeMap<u32, TitleInfo> = BTreeMap::new();

    for (kind, fields) in output.lines().filter_map(split_record) {
        match kind {
            "TCOUNT" => {
                title_count = fields.first().and_then(|f| f.trim().parse::<u32>().ok());
            }
            "CINFO" => {
                if let (Some(id), Some(value)) = (parse_u32(fields.first()), fields.get(2)) {
                    if id == attr::NAME && !value.is_empty() {
                        name = Some(value.clone());
                    }
                }
            }
            "TINFO" => {
                let (Some(index), Some(id), Some(value)) =
                    (parse_u32(fields.first()), parse_u32(fields.get(1)), fields.get(3))
                else {
                    continue;
                };
                let title = titles.entry(index).or_insert_with(|| TitleInfo {
                    index,
                    ..TitleInfo::default()
                });
                apply_title_attribute(title, id, value)?;
            }
            _ => {}
        }
    }

    if title_count.is_none() && titles.is_empty() {
        let detail = parse_messages(output)
            .pop()
            .unwrap_or_else(|| "no title listing in output".to_string());
        return Err(ToolError::Parse(detail));
    }

    Ok(DiscInfo {
        name,
        titles: titles.into_values().collect(),
    })
}

fn apply_title_attribute(title: &mut TitleInfo, id: u32, value: &str) -> Result<(), ToolError> {
    match id {
        attr::NAME => {
            if !value.is_empty() {
                title.name = Some(value.to_string());
            }
        }
        attr::CHAPTER_COUNT => {
            title.chapter_count = Some(value.trim().parse().map_err(|_| {
                ToolError::Parse(format!("invalid chapter count '{}'", value))
            })?);
        }
        attr::DURATION => title.length = value.to_string(),
        attr::DISK_SIZE_BYTES => {
            title.size = value
                .trim()
                .parse()
                .map_err(|_| ToolError::Parse(format!("invalid title size '{}'", value)))?;
        }
        attr::SOURCE_FILE_NAME => title.source_filename = value.to_string(),
        attr::OUTPUT_FILE_NAME => title.file_output = value.to_string(),
        attr::TREE_INFO => title.information = value.to_string(),
        _ => {}
    }
    Ok(())
}

fn parse_u32(field: Option<&String>) -> Option<u32> {
    field.and_then(|f| f.trim().parse().ok())
}

/// Extracts the version from the `MakeMKV vX.Y.Z ... started` banner.
pub fn parse_makemkv_version(output: &str) -> Option<String> {
    let start = output.find("MakeMKV v")? + "MakeMKV v".len();
    let version: String = output[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let version = version.trim_end_matches('.');
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}
