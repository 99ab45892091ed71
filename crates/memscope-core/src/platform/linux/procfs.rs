//! Parsers for the `/proc` text formats the backend consumes.
//!
//! Kept free of I/O so they can be tested against captured samples.

use std::collections::HashMap;

use crate::types::{Address, MemoryRegion};

/// Value of a `Key:\tvalue` line in `/proc/<pid>/status`
pub fn status_field<'a>(status: &'a str, key: &str) -> Option<&'a str>
{
    status.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        (name == key).then(|| value.trim())
    })
}

/// Real uid from the `Uid:` line (first of the four columns)
pub fn status_uid(status: &str) -> Option<u32>
{
    status_field(status, "Uid")?.split_whitespace().next()?.parse().ok()
}

/// Tracer PID from the `TracerPid:` line; `None` when untraced
pub fn status_tracer(status: &str) -> Option<u32>
{
    status_field(status, "TracerPid")?.parse().ok().filter(|pid| *pid != 0)
}

/// Whether the `State:` line marks the process as gone (zombie or dead)
pub fn status_is_defunct(status: &str) -> bool
{
    status_field(status, "State").is_some_and(|state| state.starts_with('Z') || state.starts_with('X'))
}

/// uid → user name table from `/etc/passwd`
pub fn parse_passwd(text: &str) -> HashMap<u32, String>
{
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let uid = fields.nth(1)?.parse().ok()?;
            Some((uid, name.to_string()))
        })
        .collect()
}

/// Parse one line of `/proc/<pid>/maps`
///
/// ```text
/// 55d0c0a00000-55d0c0a21000 rw-p 00000000 00:00 0          [heap]
/// ```
pub fn parse_maps_line(line: &str) -> Option<MemoryRegion>
{
    let mut rest = line.trim_start();
    let mut next_field = || {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (field, tail) = rest.split_at(end);
        rest = tail.trim_start();
        (!field.is_empty()).then_some(field)
    };

    let range = next_field()?;
    let permissions = next_field()?;
    // offset, device, inode
    for _ in 0..3 {
        next_field()?;
    }
    let name = rest.trim_end();

    let (start, end) = range.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;

    Some(MemoryRegion::new(
        Address::from(start),
        Address::from(end),
        permissions.to_string(),
        (!name.is_empty()).then(|| name.to_string()),
    ))
}

/// Parse a whole maps file, skipping lines that do not parse
pub fn parse_maps(text: &str) -> Vec<MemoryRegion>
{
    text.lines().filter_map(parse_maps_line).collect()
}

/// Split `module+offset` into its parts
///
/// The offset may be `0x` hex or decimal; a bare module name has offset 0.
pub fn split_symbol(expr: &str) -> Option<(&str, u64)>
{
    let expr = expr.trim();
    let (module, offset) = match expr.split_once('+') {
        Some((module, offset)) => {
            let offset = offset.trim();
            let offset = match offset.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16).ok()?,
                None => offset.parse().ok()?,
            };
            (module.trim(), offset)
        }
        None => (expr, 0),
    };
    (!module.is_empty()).then_some((module, offset))
}

/// Lowest mapped address of `module` among `regions`
pub fn module_base(regions: &[MemoryRegion], module: &str) -> Option<Address>
{
    regions
        .iter()
        .filter(|r| r.module_name() == Some(module) || r.name.as_deref() == Some(module))
        .map(|r| r.start)
        .min()
}
