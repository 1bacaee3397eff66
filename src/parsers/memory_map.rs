//! GNU ld `.map` file analysis

use std::collections::{BTreeMap, HashMap};
use serde::Serialize;

use super::parse_hex;

#[derive(Debug, Clone, Serialize)]
pub struct MemoryRegion {
    pub name: String,
    pub origin: String,
    pub length_bytes: u64,
    pub attributes: Option<String>,
    /// Bytes of output sections whose address falls inside the region
    pub used_bytes: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AddressRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionSize {
    pub size_bytes: u64,
    pub address_range: Option<AddressRange>,
    pub input_sections: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Contributor {
    pub object: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct MemoryMapSummary {
    pub regions: Vec<MemoryRegion>,
    pub sections: BTreeMap<String, SectionSize>,
    pub total_size_bytes: u64,
    pub top_contributors: Vec<Contributor>,
}

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    Discarded,
    Regions,
    Sections,
}

struct OpenSection {
    name: String,
    address: Option<u64>,
    size: Option<u64>,
    input_sum: u64,
    inputs: usize,
    /// Name was alone on its line; address and size follow on the next one
    awaiting_header: bool,
}

impl OpenSection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            address: None,
            size: None,
            input_sum: 0,
            inputs: 0,
            awaiting_header: false,
        }
    }

    fn finish(self) -> (String, Option<u64>, SectionSize) {
        let size = match self.size {
            Some(size) => size,
            None => self.input_sum,
        };
        let address_range = match (self.address, self.size.is_some() || self.input_sum > 0) {
            (Some(start), true) => Some(AddressRange {
                start: hex(start),
                end: hex(start.saturating_add(size)),
            }),
            _ => None,
        };
        (
            self.name,
            self.address,
            SectionSize {
                size_bytes: size,
                address_range,
                input_sections: self.inputs,
            },
        )
    }
}

/// Parse a linker map. Output sections are never dropped: one without a
/// resolvable size is reported as zero bytes with no address range.
pub fn parse(text: &str, max_contributors: usize) -> MemoryMapSummary {
    let mut phase = Phase::Sections;
    let mut regions: Vec<(MemoryRegion, u64)> = Vec::new();
    let mut finished: Vec<(String, Option<u64>, SectionSize)> = Vec::new();
    let mut current: Option<OpenSection> = None;
    let mut pending_input: Option<String> = None;
    let mut contributions: HashMap<String, u64> = HashMap::new();

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("Discarded input sections") {
            phase = Phase::Discarded;
            continue;
        }
        if trimmed == "Memory Configuration" {
            phase = Phase::Regions;
            continue;
        }
        if trimmed.starts_with("Linker script and memory map") {
            phase = Phase::Sections;
            continue;
        }

        match phase {
            Phase::Discarded => {}
            Phase::Regions => {
                if let Some(region) = parse_region(trimmed) {
                    regions.push(region);
                }
            }
            Phase::Sections => {
                if trimmed.is_empty() {
                    continue;
                }
                let tokens: Vec<&str> = trimmed.split_whitespace().collect();

                if !line.starts_with(char::is_whitespace) {
                    if !trimmed.starts_with('.') {
                        continue;
                    }
                    if let Some(done) = current.take() {
                        finished.push(done.finish());
                    }
                    pending_input = None;
                    let mut section = OpenSection::new(tokens[0]);
                    match tokens.len() {
                        1 => section.awaiting_header = true,
                        _ => {
                            section.address = tokens.get(1).and_then(|t| parse_hex(t));
                            section.size = tokens.get(2).and_then(|t| parse_hex(t));
                        }
                    }
                    current = Some(section);
                    continue;
                }

                let Some(section) = current.as_mut() else {
                    continue;
                };

                if section.awaiting_header {
                    section.awaiting_header = false;
                    if let [addr, size, ..] = tokens.as_slice() {
                        if let (Some(addr), Some(size)) = (parse_hex(addr), parse_hex(size)) {
                            section.address = Some(addr);
                            section.size = Some(size);
                            continue;
                        }
                    }
                }

                // Input section on one line, or the second half of a wrapped one
                let (name, rest) = if tokens[0].starts_with('.') || tokens[0] == "*fill*" {
                    if tokens.len() == 1 {
                        pending_input = Some(tokens[0].to_string());
                        continue;
                    }
                    (Some(tokens[0].to_string()), &tokens[1..])
                } else {
                    (pending_input.take(), &tokens[..])
                };
                let Some(name) = name else {
                    continue;
                };

                if let [addr, size, object @ ..] = rest {
                    // `0x.. symbol` lines have no size column
                    if let (Some(_), Some(size)) = (parse_hex(addr), parse_hex(size)) {
                        section.input_sum = section.input_sum.saturating_add(size);
                        section.inputs += 1;
                        if !object.is_empty() && name != "*fill*" && size > 0 {
                            *contributions.entry(object.join(" ")).or_default() += size;
                        }
                    }
                }
                pending_input = None;
            }
        }
    }
    if let Some(done) = current.take() {
        finished.push(done.finish());
    }

    let mut regions: Vec<MemoryRegion> = regions
        .into_iter()
        .map(|(mut region, origin)| {
            let end = origin.saturating_add(region.length_bytes);
            region.used_bytes = finished
                .iter()
                .filter(|(_, addr, _)| addr.is_some_and(|a| a >= origin && a < end))
                .map(|(_, _, s)| s.size_bytes)
                .sum();
            region
        })
        .collect();
    regions.retain(|r| r.name != "*default*");

    let total_size_bytes = finished.iter().map(|(_, _, s)| s.size_bytes).sum();

    let mut top_contributors: Vec<Contributor> = contributions
        .into_iter()
        .map(|(object, size_bytes)| Contributor { object, size_bytes })
        .collect();
    top_contributors.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then_with(|| a.object.cmp(&b.object)));
    top_contributors.truncate(max_contributors);

    let mut sections = BTreeMap::new();
    for (name, _, size) in finished {
        // ld can list one name twice (e.g. .debug_*); keep the sum
        sections
            .entry(name)
            .and_modify(|existing: &mut SectionSize| {
                existing.size_bytes += size.size_bytes;
                existing.input_sections += size.input_sections;
            })
            .or_insert(size);
    }

    MemoryMapSummary {
        regions,
        sections,
        total_size_bytes,
        top_contributors,
    }
}

fn parse_region(line: &str) -> Option<(MemoryRegion, u64)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [name, origin, length, rest @ ..] = tokens.as_slice() else {
        return None;
    };
    let origin = parse_hex(origin)?;
    let length = parse_hex(length)?;
    Some((
        MemoryRegion {
            name: name.to_string(),
            origin: hex(origin),
            length_bytes: length,
            attributes: rest.first().map(|a| a.to_string()),
            used_bytes: 0,
        },
        origin,
    ))
}

fn hex(value: u64) -> String {
    format!("0x{:08x}", value)
}
