use std::ops::Deref;

use super::BitCollection;
use crate::{Bit, Operation, Register};

/// Maximal run of adjacent bits sharing one overlay tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverlayRun {
    /// Shared overlay tag.
    pub name: String,
    /// Number of bits in the run.
    pub length: usize,
    /// Data of the run's bits, most significant first.
    pub value: u128,
}

impl<R: Deref<Target = Register>> BitCollection<R> {
    /// Compact per-nibble status for `operation`, marking overlays.
    #[must_use]
    pub fn status_str(&self, operation: Operation) -> String {
        self.status_str_with(operation, true)
    }

    /// Compact per-nibble status for `operation`.
    ///
    /// Each bit is classified as `S` (store), `V` (overlay, when
    /// `mark_overlays` is set), `X` (read without a read tag) or its digit.
    /// Nibbles are grouped by significance; a partial nibble leads when the
    /// width is not a multiple of four. A nibble of plain digits renders as a
    /// hex digit, a uniform nibble of markers as that marker, anything else
    /// as a lowercased binary group in parentheses.
    #[must_use]
    pub fn status_str_with(&self, operation: Operation, mark_overlays: bool) -> String {
        let chars: Vec<char> = self
            .shift_out_left()
            .map(|bit| classify(bit, operation, mark_overlays))
            .collect();

        let lead = match chars.len() % 4 {
            0 => 4,
            partial => partial,
        };
        let mut out = String::new();
        let (head, tail) = chars.split_at(lead.min(chars.len()));
        render_nibble(&mut out, head);
        for nibble in tail.chunks(4) {
            render_nibble(&mut out, nibble);
        }
        out
    }

    /// Runs of identical overlay tags, most significant first.
    #[must_use]
    pub fn unique_overlays(&self) -> Vec<OverlayRun> {
        let mut runs: Vec<OverlayRun> = Vec::new();
        let mut open = false;
        for bit in self.shift_out_left() {
            let Some(name) = bit.overlay_name() else {
                open = false;
                continue;
            };
            match runs.last_mut() {
                Some(run) if open && run.name == name => {
                    run.length += 1;
                    run.value = (run.value << 1) | u128::from(bit.data());
                }
                _ => {
                    runs.push(OverlayRun {
                        name: name.to_owned(),
                        length: 1,
                        value: u128::from(bit.data()),
                    });
                    open = true;
                }
            }
        }
        runs
    }

    /// First overlay tag found from the most significant end.
    #[must_use]
    pub fn overlay_str(&self) -> Option<&str> {
        self.shift_out_left().find_map(Bit::overlay_name)
    }

    /// Returns `true` when any bit has an overlay (matching `name`, if given).
    #[must_use]
    pub fn has_overlay(&self, name: Option<&str>) -> bool {
        self.shift_out_right().any(|bit| bit.has_overlay(name))
    }
}

fn classify(bit: &Bit, operation: Operation, mark_overlays: bool) -> char {
    let digit = if bit.data() == 1 { '1' } else { '0' };
    let overlaid = mark_overlays && bit.has_overlay(None);
    match operation {
        Operation::Read if bit.is_to_be_stored() => 'S',
        Operation::Read if bit.is_to_be_read() => {
            if overlaid {
                'V'
            } else {
                digit
            }
        }
        Operation::Read => 'X',
        Operation::Write if overlaid => 'V',
        Operation::Write => digit,
    }
}

fn render_nibble(out: &mut String, nibble: &[char]) {
    let Some(&first) = nibble.first() else {
        return;
    };
    if nibble.iter().all(|c| matches!(c, '0' | '1')) {
        let value = nibble
            .iter()
            .fold(0_u32, |acc, &c| (acc << 1) | u32::from(c == '1'));
        if let Some(digit) = char::from_digit(value, 16) {
            out.push(digit.to_ascii_uppercase());
        }
    } else if nibble.iter().all(|&c| c == first) {
        out.push(first);
    } else {
        let group: String = nibble.iter().collect();
        out.push('(');
        out.push_str(&group.to_ascii_lowercase());
        out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::OverlayRun;
    use crate::{BitOptions, Operation, Register, RegisterOptions};

    fn register(size: usize) -> Register {
        Register::new("status", 0, RegisterOptions::new().size(size).init_as_writable(true))
            .expect("valid register")
    }

    #[rstest]
    #[case::single_hex_digit(4, 0x5, "5")]
    #[case::two_nibbles(8, 0xA5, "A5")]
    #[case::leading_partial(6, 0b10_0101, "25")]
    #[case::wide(16, 0xBEEF, "BEEF")]
    fn write_status_renders_hex_digits(
        #[case] size: usize,
        #[case] value: u128,
        #[case] expected: &str,
    ) {
        let mut reg = register(size);
        reg.write(value);
        assert_eq!(reg.status_str(Operation::Write), expected);
    }

    #[test]
    fn overlay_marks_whole_and_half_fields() {
        let mut reg = register(8);
        reg.add_bus("field", 0, 4, BitOptions::new().reset(0x5))
            .expect("fits");
        let field = reg.field("field").expect("declared");
        assert_eq!(field.status_str(Operation::Write), "5");

        reg.field_mut("field").expect("declared").overlay("pin");
        assert_eq!(
            reg.field("field")
                .expect("declared")
                .status_str(Operation::Write),
            "V"
        );

        let mut wide = register(8);
        wide.write(0x05);
        wide.all_mut().select([7..=4]).expect("in range").overlay("hi");
        assert_eq!(wide.status_str(Operation::Write), "V5");
        assert_eq!(wide.all().status_str_with(Operation::Write, false), "05");
    }

    #[test]
    fn read_status_distinguishes_store_overlay_and_dont_care() {
        let mut reg = register(8);
        reg.write(0x3C);
        assert_eq!(reg.status_str(Operation::Read), "XX");

        reg.all_mut().select([3..=0]).expect("in range").read(None);
        assert_eq!(reg.status_str(Operation::Read), "XC");

        reg.all_mut().select([7..=4]).expect("in range").store();
        assert_eq!(reg.status_str(Operation::Read), "SC");

        reg.all_mut().select([1..=0]).expect("in range").overlay("ov");
        assert_eq!(reg.status_str(Operation::Read), "S(11vv)");
    }

    #[test]
    fn mixed_nibble_with_dont_care_is_parenthesized() {
        let mut reg = register(4);
        reg.write(0b0110);
        reg.all_mut().select([1_usize]).expect("in range").read(None);
        assert_eq!(reg.status_str(Operation::Read), "(xx1x)");
    }

    #[test]
    fn overlay_runs_split_on_tag_change_and_gaps() {
        let mut reg = register(8);
        reg.write(0b1101_0110);
        reg.all_mut().select([7..=6]).expect("in range").overlay("a");
        reg.all_mut().select([5..=4]).expect("in range").overlay("b");
        reg.all_mut().select([2..=1]).expect("in range").overlay("b");

        assert_eq!(
            reg.all().unique_overlays(),
            vec![
                OverlayRun {
                    name: "a".to_owned(),
                    length: 2,
                    value: 0b11,
                },
                OverlayRun {
                    name: "b".to_owned(),
                    length: 2,
                    value: 0b01,
                },
                OverlayRun {
                    name: "b".to_owned(),
                    length: 2,
                    value: 0b11,
                },
            ]
        );
        assert_eq!(reg.all().overlay_str(), Some("a"));
        assert!(reg.all().has_overlay(Some("b")));
        assert!(!reg.all().has_overlay(Some("c")));
    }
}
