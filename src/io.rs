//! Text formats read and written by the `block-cache` driver.
//!
//! Layout file: first line `max_ram_blocks [max_disk_file_size]`, then one line
//! per band `blocks_x blocks_y block_size_bytes`. Writing the first header
//! token as `<bytes>B` sizes the RAM budget in bytes instead.
//!
//! Script file: one command per line, `#` starts a comment:
//! `get b r c`, `write b r c value`, `read b r c`, `top|bottom|left|right n band`,
//! `topbands|bottombands n`.

use std::fs;
use std::path::Path;

use crate::config::{max_ram_blocks_for_budget, BandLayout, ManagerConfig};
use crate::error::Result;
use crate::manager::BlockManager;

/// One line of a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Get { band: usize, row: usize, col: usize },
    Write { band: usize, row: usize, col: usize, value: u8 },
    Read { band: usize, row: usize, col: usize },
    AddTop { n: usize, band: usize },
    AddBottom { n: usize, band: usize },
    AddLeft { n: usize, band: usize },
    AddRight { n: usize, band: usize },
    AddTopBands { n: usize },
    AddBottomBands { n: usize },
}

impl Command {
    /// Run against `manager` and return the output line
    pub fn execute(&self, manager: &mut BlockManager) -> Result<String> {
        Ok(match *self {
            Command::Get { band, row, col } => {
                manager.get_block_pointer(band, row, col)?;
                "ok".to_string()
            }
            Command::Write { band, row, col, value } => {
                manager.get_block_pointer(band, row, col)?.fill(value);
                "ok".to_string()
            }
            Command::Read { band, row, col } => {
                manager.get_block_pointer(band, row, col)?[0].to_string()
            }
            Command::AddTop { n, band } => manager.add_top_blocks(n, band)?.len().to_string(),
            Command::AddBottom { n, band } => manager.add_bottom_blocks(n, band)?.len().to_string(),
            Command::AddLeft { n, band } => manager.add_left_blocks(n, band)?.len().to_string(),
            Command::AddRight { n, band } => manager.add_right_blocks(n, band)?.len().to_string(),
            Command::AddTopBands { n } => manager.add_top_bands(n)?.len().to_string(),
            Command::AddBottomBands { n } => manager.add_bottom_bands(n)?.len().to_string(),
        })
    }
}

pub fn read_layout<P: AsRef<Path>>(path: P) -> std::result::Result<ManagerConfig, String> {
    let content = fs::read_to_string(path.as_ref())
        .map_err(|e| format!("Failed to read layout file: {}", e))?;
    parse_layout(&content)
}

pub fn parse_layout(content: &str) -> std::result::Result<ManagerConfig, String> {
    let mut lines = content
        .lines()
        .map(strip_comment)
        .filter(|l| !l.is_empty());

    let header = lines.next().ok_or("Layout file is empty")?;
    let tokens: Vec<&str> = header.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() > 2 {
        return Err(format!("Layout header has {} tokens, expected 1 or 2", tokens.len()));
    }
    // A trailing `B` gives the RAM budget in bytes instead of blocks
    let ram_budget_bytes: Option<u64> = tokens[0]
        .strip_suffix('B')
        .map(|bytes| parse_token(bytes, "RAM budget bytes"))
        .transpose()?;

    let mut bands = Vec::new();
    for line in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 3 {
            return Err(format!("Band line '{}' has {} tokens, expected 3", line, tokens.len()));
        }
        bands.push(BandLayout::new(
            parse_token(tokens[0], "blocks x")?,
            parse_token(tokens[1], "blocks y")?,
            parse_token(tokens[2], "block size")?,
        ));
    }

    let max_ram_blocks = match ram_budget_bytes {
        Some(budget) => {
            let block_size = bands.iter().map(|b| b.block_size_bytes).max().unwrap_or(0);
            max_ram_blocks_for_budget(budget, block_size)
        }
        None => parse_token(tokens[0], "max RAM blocks")?,
    };

    let mut config = ManagerConfig::new(max_ram_blocks, bands);
    if let Some(size) = tokens.get(1) {
        config = config.with_max_disk_file_size(parse_token(size, "max disk file size")?);
    }
    Ok(config)
}

pub fn read_script<P: AsRef<Path>>(path: P) -> std::result::Result<Vec<Command>, String> {
    let content = fs::read_to_string(path.as_ref())
        .map_err(|e| format!("Failed to read script file: {}", e))?;
    parse_script(&content)
}

pub fn parse_script(content: &str) -> std::result::Result<Vec<Command>, String> {
    content
        .lines()
        .map(strip_comment)
        .filter(|l| !l.is_empty())
        .map(parse_command)
        .collect()
}

fn parse_command(line: &str) -> std::result::Result<Command, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (name, args) = tokens.split_first().ok_or("Empty command")?;
    let num = |i: usize, what: &str| -> std::result::Result<usize, String> {
        let token = args
            .get(i)
            .ok_or_else(|| format!("'{}' is missing its {}", name, what))?;
        parse_token(token, what)
    };

    let expected = match *name {
        "get" | "read" => 3,
        "write" => 4,
        "top" | "bottom" | "left" | "right" => 2,
        "topbands" | "bottombands" => 1,
        _ => return Err(format!("Unknown command: {}", name)),
    };
    if args.len() != expected {
        return Err(format!(
            "'{}' takes {} arguments, got {}",
            name,
            expected,
            args.len()
        ));
    }

    Ok(match *name {
        "get" => Command::Get { band: num(0, "band")?, row: num(1, "row")?, col: num(2, "col")? },
        "read" => Command::Read { band: num(0, "band")?, row: num(1, "row")?, col: num(2, "col")? },
        "write" => {
            let value: u8 = parse_token(args[3], "byte value")?;
            Command::Write { band: num(0, "band")?, row: num(1, "row")?, col: num(2, "col")?, value }
        }
        "top" => Command::AddTop { n: num(0, "count")?, band: num(1, "band")? },
        "bottom" => Command::AddBottom { n: num(0, "count")?, band: num(1, "band")? },
        "left" => Command::AddLeft { n: num(0, "count")?, band: num(1, "band")? },
        "right" => Command::AddRight { n: num(0, "count")?, band: num(1, "band")? },
        "topbands" => Command::AddTopBands { n: num(0, "count")? },
        _ => Command::AddBottomBands { n: num(0, "count")? },
    })
}

fn strip_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or("").trim()
}

fn parse_token<T: std::str::FromStr>(token: &str, what: &str) -> std::result::Result<T, String> {
    token
        .parse()
        .map_err(|_| format!("Invalid {}: {}", what, token))
}

pub fn write_results<P: AsRef<Path>>(path: P, results: &[String]) -> std::result::Result<(), String> {
    let mut content = results.join("\n");
    content.push('\n');
    fs::write(path.as_ref(), content).map_err(|e| format!("Failed to write output file: {}", e))
}
