//! HID report descriptor scanning.
//!
//! `hidapi` exposes the raw report descriptor but not the report lengths the
//! catalog filters on, so they are derived here: the total bit width of every
//! Input/Output main item is summed per report ID, and the longest report wins.
//! When the device uses report IDs, one byte is added for the ID prefix.
use std::collections::HashMap;

/// Maximum report lengths in bytes, including the report ID byte when used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportLengths {
    pub input: Option<usize>,
    pub output: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemType {
    Main,
    Global,
    Local,
    Reserved,
}

#[derive(Debug, PartialEq, Eq)]
struct Item<'a> {
    item_type: ItemType,
    tag: u8,
    data: &'a [u8],
}

impl Item<'_> {
    fn value(&self) -> u32 {
        self.data
            .iter()
            .rev()
            .fold(0u32, |acc, &byte| (acc << 8) | byte as u32)
    }
}

/// Iterator over the short and long items of a descriptor. Stops at the first
/// truncated item.
struct Items<'a> {
    descriptor: &'a [u8],
    position: usize,
}

impl<'a> Iterator for Items<'a> {
    type Item = Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = *self.descriptor.get(self.position)?;
        let mut size = match header & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let item_type = match (header >> 2) & 0x03 {
            0 => ItemType::Main,
            1 => ItemType::Global,
            2 => ItemType::Local,
            _ => ItemType::Reserved,
        };
        let mut tag = header >> 4;
        self.position += 1;

        // Long item: 0xFE, size byte, tag byte
        if header == 0xFE {
            size = *self.descriptor.get(self.position)? as usize;
            tag = *self.descriptor.get(self.position + 1)?;
            self.position += 2;
        }

        let data = self
            .descriptor
            .get(self.position..self.position + size)?;
        self.position += size;
        Some(Item {
            item_type,
            tag,
            data,
        })
    }
}

const MAIN_INPUT: u8 = 0x8;
const MAIN_OUTPUT: u8 = 0x9;
const GLOBAL_REPORT_SIZE: u8 = 0x7;
const GLOBAL_REPORT_ID: u8 = 0x8;
const GLOBAL_REPORT_COUNT: u8 = 0x9;
const GLOBAL_PUSH: u8 = 0xA;
const GLOBAL_POP: u8 = 0xB;

#[derive(Debug, Clone, Copy, Default)]
struct GlobalState {
    report_size: u32,
    report_count: u32,
    report_id: u8,
}

/// Compute the maximum input and output report lengths declared by a descriptor.
pub fn report_lengths(descriptor: &[u8]) -> ReportLengths {
    let mut state = GlobalState::default();
    let mut stack = Vec::new();
    let mut uses_report_ids = false;
    let mut input_bits: HashMap<u8, u32> = HashMap::new();
    let mut output_bits: HashMap<u8, u32> = HashMap::new();

    let items = Items {
        descriptor,
        position: 0,
    };
    for item in items {
        match (item.item_type, item.tag) {
            (ItemType::Global, GLOBAL_REPORT_SIZE) => state.report_size = item.value(),
            (ItemType::Global, GLOBAL_REPORT_COUNT) => state.report_count = item.value(),
            (ItemType::Global, GLOBAL_REPORT_ID) => {
                uses_report_ids = true;
                state.report_id = item.value() as u8;
            }
            (ItemType::Global, GLOBAL_PUSH) => stack.push(state),
            (ItemType::Global, GLOBAL_POP) => {
                if let Some(saved) = stack.pop() {
                    state = saved;
                }
            }
            (ItemType::Main, MAIN_INPUT) => {
                *input_bits.entry(state.report_id).or_default() +=
                    state.report_size.saturating_mul(state.report_count);
            }
            (ItemType::Main, MAIN_OUTPUT) => {
                *output_bits.entry(state.report_id).or_default() +=
                    state.report_size.saturating_mul(state.report_count);
            }
            _ => {}
        }
    }

    let longest = |bits: &HashMap<u8, u32>| {
        bits.values()
            .max()
            .map(|&b| (b as usize).div_ceil(8) + usize::from(uses_report_ids))
    };

    ReportLengths {
        input: longest(&input_bits),
        output: longest(&output_bits),
    }
}
