use std::{fmt::Write as _, ops::Range};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    chart::{ChartDocument, NoteGrid},
    error::StepgaugeError,
};

pub const UNIFIED_CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDiffReport {
    pub level_a: usize,
    pub level_b: usize,
    pub same_line_count: usize,
    pub different_line_count: usize,
    pub total_lines_a: usize,
    pub total_lines_b: usize,
    pub similarity_ratio: f64,
    pub unified_diff: String,
}

impl ChartDiffReport {
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.different_line_count == 0 && self.total_lines_a == self.total_lines_b
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelMatch {
    Explicit,
    Label,
    Positional,
    /// Only one document carried the target label.
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSelection {
    pub level_a: usize,
    pub level_b: usize,
    pub how: LevelMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// `a[a_start..a_end]` relates to `b[b_start..b_end]` as `tag` says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub tag: OpTag,
    pub a_start: usize,
    pub a_end: usize,
    pub b_start: usize,
    pub b_end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MatchBlock {
    a_start: usize,
    b_start: usize,
    len: usize,
}

/// Compares the body lines of two grids. Metadata never takes part.
#[must_use]
pub fn compare(
    grid_a: &NoteGrid,
    level_a: usize,
    grid_b: &NoteGrid,
    level_b: usize,
) -> ChartDiffReport {
    compare_labeled(
        grid_a,
        &format!("chart a (level {level_a})"),
        level_a,
        grid_b,
        &format!("chart b (level {level_b})"),
        level_b,
    )
}

#[instrument(skip(grid_a, grid_b), fields(rows_a = grid_a.row_count(), rows_b = grid_b.row_count()))]
pub fn compare_labeled(
    grid_a: &NoteGrid,
    label_a: &str,
    level_a: usize,
    grid_b: &NoteGrid,
    label_b: &str,
    level_b: usize,
) -> ChartDiffReport {
    let lines_a = grid_a.body_lines();
    let lines_b = grid_b.body_lines();
    let mut report = compare_lines(&lines_a, &lines_b, label_a, label_b);
    report.level_a = level_a;
    report.level_b = level_b;
    debug!(
        same = report.same_line_count,
        different = report.different_line_count,
        ratio = report.similarity_ratio,
        "chart bodies compared"
    );
    report
}

/// Line-sequence comparison behind [`compare`]. Levels are left at 0.
#[must_use]
pub fn compare_lines<S: AsRef<str> + PartialEq>(
    lines_a: &[S],
    lines_b: &[S],
    label_a: &str,
    label_b: &str,
) -> ChartDiffReport {
    let blocks = matching_blocks(lines_a, lines_b);
    let same_line_count: usize = blocks.iter().map(|block| block.len).sum();
    let total = lines_a.len() + lines_b.len();
    let similarity_ratio = if total == 0 {
        1.0
    } else {
        2.0 * same_line_count as f64 / total as f64
    };
    let opcodes = opcodes_from_blocks(&blocks, lines_a.len(), lines_b.len());

    ChartDiffReport {
        level_a: 0,
        level_b: 0,
        same_line_count,
        different_line_count: lines_a.len().max(lines_b.len()) - same_line_count,
        total_lines_a: lines_a.len(),
        total_lines_b: lines_b.len(),
        similarity_ratio,
        unified_diff: unified_diff(lines_a, lines_b, &opcodes, label_a, label_b),
    }
}

/// Picks the levels to compare. Explicit indices win; otherwise both
/// documents are searched for `target_label` and, failing a match on both
/// sides, level 0 of each is used.
pub fn resolve_levels(
    doc_a: &ChartDocument,
    doc_b: &ChartDocument,
    explicit: Option<(usize, usize)>,
    target_label: &str,
) -> Result<LevelSelection, StepgaugeError> {
    let selection = if let Some((level_a, level_b)) = explicit {
        LevelSelection {
            level_a,
            level_b,
            how: LevelMatch::Explicit,
        }
    } else {
        let found_a = doc_a.find_by_difficulty(target_label);
        let found_b = doc_b.find_by_difficulty(target_label);
        match (found_a, found_b) {
            (Some(section_a), Some(section_b)) => LevelSelection {
                level_a: section_a.meta.level_index,
                level_b: section_b.meta.level_index,
                how: LevelMatch::Label,
            },
            (None, None) => LevelSelection {
                level_a: 0,
                level_b: 0,
                how: LevelMatch::Positional,
            },
            _ => {
                warn!(
                    target_label,
                    found_in_a = found_a.is_some(),
                    found_in_b = found_b.is_some(),
                    "difficulty label found on one side only; comparing level 0"
                );
                LevelSelection {
                    level_a: 0,
                    level_b: 0,
                    how: LevelMatch::Mismatch,
                }
            }
        }
    };

    doc_a.section(selection.level_a)?;
    doc_b.section(selection.level_b)?;
    Ok(selection)
}

/// Resolves the levels and compares their bodies, naming each side with
/// the given labels.
#[instrument(skip(doc_a, doc_b))]
pub fn compare_documents(
    doc_a: &ChartDocument,
    name_a: &str,
    doc_b: &ChartDocument,
    name_b: &str,
    explicit: Option<(usize, usize)>,
    target_label: &str,
) -> Result<(LevelSelection, ChartDiffReport), StepgaugeError> {
    let selection = resolve_levels(doc_a, doc_b, explicit, target_label)?;
    let section_a = doc_a.section(selection.level_a)?;
    let section_b = doc_b.section(selection.level_b)?;

    let report = compare_labeled(
        &section_a.grid,
        &format!("{name_a} (chart data level {})", selection.level_a),
        selection.level_a,
        &section_b.grid,
        &format!("{name_b} (chart data level {})", selection.level_b),
        selection.level_b,
    );
    info!(
        level_a = selection.level_a,
        level_b = selection.level_b,
        how = ?selection.how,
        ratio = report.similarity_ratio,
        "chart comparison finished"
    );
    Ok((selection, report))
}

/// Edit operations turning `a` into `b`, grouped the way a line differ
/// reports them.
#[must_use]
pub fn opcodes<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Opcode> {
    opcodes_from_blocks(&matching_blocks(a, b), a.len(), b.len())
}

fn matching_blocks<T: PartialEq>(a: &[T], b: &[T]) -> Vec<MatchBlock> {
    let prefix = common_prefix_len(a, b);
    let suffix = common_suffix_len(&a[prefix..], &b[prefix..]);

    let mut blocks: Vec<MatchBlock> = Vec::new();
    let mut push = |a_start: usize, b_start: usize, len: usize| {
        if len == 0 {
            return;
        }
        match blocks.last_mut() {
            Some(last) if last.a_start + last.len == a_start && last.b_start + last.len == b_start => {
                last.len += len;
            }
            _ => blocks.push(MatchBlock {
                a_start,
                b_start,
                len,
            }),
        }
    };

    push(0, 0, prefix);
    let middle_a = &a[prefix..a.len() - suffix];
    let middle_b = &b[prefix..b.len() - suffix];
    for (index_a, index_b) in myers_matches(middle_a, middle_b) {
        push(prefix + index_a, prefix + index_b, 1);
    }
    push(a.len() - suffix, b.len() - suffix, suffix);
    blocks
}

/// Matched index pairs of a shortest edit script between `a` and `b`, in
/// ascending order. Divides on middle snakes so memory stays linear in the
/// input length.
fn myers_matches<T: PartialEq>(a: &[T], b: &[T]) -> Vec<(usize, usize)> {
    let mut matches = Vec::new();
    if a.is_empty() || b.is_empty() {
        return matches;
    }
    let mut frontiers = Frontiers::new(a.len() + b.len());
    conquer(a, 0..a.len(), b, 0..b.len(), &mut frontiers, &mut matches);
    matches
}

/// Furthest-reaching x per diagonal for the forward and reverse searches,
/// shared by every subproblem.
struct Frontiers {
    forward: Vec<isize>,
    backward: Vec<isize>,
    offset: isize,
}

impl Frontiers {
    fn new(total_len: usize) -> Self {
        let offset = (total_len / 2 + 2) as isize;
        let width = (2 * offset + 1) as usize;
        Self {
            forward: vec![0; width],
            backward: vec![0; width],
            offset,
        }
    }
}

fn conquer<T: PartialEq>(
    a: &[T],
    mut range_a: Range<usize>,
    b: &[T],
    mut range_b: Range<usize>,
    frontiers: &mut Frontiers,
    matches: &mut Vec<(usize, usize)>,
) {
    let prefix = common_prefix_len(&a[range_a.clone()], &b[range_b.clone()]);
    matches.extend((0..prefix).map(|step| (range_a.start + step, range_b.start + step)));
    range_a.start += prefix;
    range_b.start += prefix;

    let suffix = common_suffix_len(&a[range_a.clone()], &b[range_b.clone()]);
    range_a.end -= suffix;
    range_b.end -= suffix;

    if !range_a.is_empty() && !range_b.is_empty() {
        let split = middle_snake(&a[range_a.clone()], &b[range_b.clone()], frontiers);
        if let Some((split_a, split_b)) = split {
            let (mid_a, mid_b) = (range_a.start + split_a, range_b.start + split_b);
            conquer(a, range_a.start..mid_a, b, range_b.start..mid_b, frontiers, matches);
            conquer(a, mid_a..range_a.end, b, mid_b..range_b.end, frontiers, matches);
        }
    }

    matches.extend((0..suffix).map(|step| (range_a.end + step, range_b.end + step)));
}

/// Start of a snake lying on some shortest edit path between `a` and `b`.
/// Both inputs are non-empty and share no common prefix or suffix.
fn middle_snake<T: PartialEq>(a: &[T], b: &[T], frontiers: &mut Frontiers) -> Option<(usize, usize)> {
    let Frontiers {
        forward,
        backward,
        offset,
    } = frontiers;
    let offset = *offset;
    let slot = |k: isize| (k + offset) as usize;
    let n = a.len() as isize;
    let m = b.len() as isize;
    let delta = n - m;
    let odd = delta & 1 == 1;
    let point = |x: isize, y: isize| usize::try_from(x).ok().zip(usize::try_from(y).ok());

    forward[slot(1)] = 0;
    backward[slot(1)] = 0;
    for d in 0..(n + m + 1) / 2 + 1 {
        for k in (-d..=d).rev().step_by(2) {
            let mut x = if k == -d || (k != d && forward[slot(k - 1)] < forward[slot(k + 1)]) {
                forward[slot(k + 1)]
            } else {
                forward[slot(k - 1)] + 1
            };
            let (start_x, start_y) = (x, x - k);
            while x < n && (0..m).contains(&(x - k)) && a[x as usize] == b[(x - k) as usize] {
                x += 1;
            }
            forward[slot(k)] = x;
            if odd && (k - delta).abs() < d && x + backward[slot(delta - k)] >= n {
                return point(start_x, start_y);
            }
        }

        for k in (-d..=d).rev().step_by(2) {
            let mut x = if k == -d || (k != d && backward[slot(k - 1)] < backward[slot(k + 1)]) {
                backward[slot(k + 1)]
            } else {
                backward[slot(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n
                && (0..m).contains(&y)
                && a[(n - x - 1) as usize] == b[(m - y - 1) as usize]
            {
                x += 1;
                y += 1;
            }
            backward[slot(k)] = x;
            if !odd && (k - delta).abs() <= d && x + forward[slot(delta - k)] >= n {
                return point(n - x, m - y);
            }
        }
    }
    None
}

fn common_prefix_len<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter().zip(b).take_while(|(left, right)| left == right).count()
}

fn common_suffix_len<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(left, right)| left == right)
        .count()
}

fn opcodes_from_blocks(blocks: &[MatchBlock], len_a: usize, len_b: usize) -> Vec<Opcode> {
    let sentinel = MatchBlock {
        a_start: len_a,
        b_start: len_b,
        len: 0,
    };
    let mut codes = Vec::new();
    let (mut i, mut j) = (0, 0);
    for block in blocks.iter().chain(std::iter::once(&sentinel)) {
        let tag = match (i < block.a_start, j < block.b_start) {
            (true, true) => Some(OpTag::Replace),
            (true, false) => Some(OpTag::Delete),
            (false, true) => Some(OpTag::Insert),
            (false, false) => None,
        };
        if let Some(tag) = tag {
            codes.push(Opcode {
                tag,
                a_start: i,
                a_end: block.a_start,
                b_start: j,
                b_end: block.b_start,
            });
        }
        i = block.a_start + block.len;
        j = block.b_start + block.len;
        if block.len > 0 {
            codes.push(Opcode {
                tag: OpTag::Equal,
                a_start: block.a_start,
                a_end: i,
                b_start: block.b_start,
                b_end: j,
            });
        }
    }
    codes
}

/// Hunks of changes with up to `context` equal lines around each.
fn grouped_opcodes(mut codes: Vec<Opcode>, context: usize) -> Vec<Vec<Opcode>> {
    if codes.is_empty() {
        codes.push(Opcode {
            tag: OpTag::Equal,
            a_start: 0,
            a_end: 1,
            b_start: 0,
            b_end: 1,
        });
    }
    if let Some(first) = codes.first_mut().filter(|code| code.tag == OpTag::Equal) {
        first.a_start = first.a_start.max(first.a_end.saturating_sub(context));
        first.b_start = first.b_start.max(first.b_end.saturating_sub(context));
    }
    if let Some(last) = codes.last_mut().filter(|code| code.tag == OpTag::Equal) {
        last.a_end = last.a_end.min(last.a_start + context);
        last.b_end = last.b_end.min(last.b_start + context);
    }

    let mut groups = Vec::new();
    let mut group = Vec::new();
    for mut code in codes {
        if code.tag == OpTag::Equal && code.a_end - code.a_start > 2 * context {
            group.push(Opcode {
                a_end: code.a_end.min(code.a_start + context),
                b_end: code.b_end.min(code.b_start + context),
                ..code
            });
            groups.push(std::mem::take(&mut group));
            code.a_start = code.a_start.max(code.a_end - context);
            code.b_start = code.b_start.max(code.b_end - context);
        }
        group.push(code);
    }
    if !(group.is_empty() || (group.len() == 1 && group[0].tag == OpTag::Equal)) {
        groups.push(group);
    }
    groups
}

fn unified_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    match length {
        0 => format!("{start},0"),
        1 => format!("{}", start + 1),
        _ => format!("{},{length}", start + 1),
    }
}

fn unified_diff<S: AsRef<str>>(
    lines_a: &[S],
    lines_b: &[S],
    codes: &[Opcode],
    label_a: &str,
    label_b: &str,
) -> String {
    let groups = grouped_opcodes(codes.to_vec(), UNIFIED_CONTEXT_LINES);
    let mut out = String::new();
    if groups.is_empty() {
        return out;
    }

    let _ = writeln!(out, "--- {label_a}");
    let _ = writeln!(out, "+++ {label_b}");
    for group in &groups {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let _ = writeln!(
            out,
            "@@ -{} +{} @@",
            unified_range(first.a_start, last.a_end),
            unified_range(first.b_start, last.b_end)
        );
        for code in group {
            if code.tag == OpTag::Equal {
                for line in &lines_a[code.a_start..code.a_end] {
                    let _ = writeln!(out, " {}", line.as_ref());
                }
                continue;
            }
            if matches!(code.tag, OpTag::Replace | OpTag::Delete) {
                for line in &lines_a[code.a_start..code.a_end] {
                    let _ = writeln!(out, "-{}", line.as_ref());
                }
            }
            if matches!(code.tag, OpTag::Replace | OpTag::Insert) {
                for line in &lines_b[code.b_start..code.b_end] {
                    let _ = writeln!(out, "+{}", line.as_ref());
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::parse_body;

    fn lines(text: &str) -> Vec<&str> {
        text.split(' ').filter(|token| !token.is_empty()).collect()
    }

    fn lcs_len(a: &[&str], b: &[&str]) -> usize {
        let mut table = vec![vec![0_usize; b.len() + 1]; a.len() + 1];
        for i in (0..a.len()).rev() {
            for j in (0..b.len()).rev() {
                table[i][j] = if a[i] == b[j] {
                    table[i + 1][j + 1] + 1
                } else {
                    table[i + 1][j].max(table[i][j + 1])
                };
            }
        }
        table[0][0]
    }

    #[test]
    fn identical_sequences_are_fully_similar() {
        let a = lines("1000 0100 , 0010 ;");
        let report = compare_lines(&a, &a, "a", "b");
        assert_eq!(report.similarity_ratio, 1.0);
        assert_eq!(report.different_line_count, 0);
        assert!(report.unified_diff.is_empty());
    }

    #[test]
    fn disjoint_sequences_have_zero_ratio() {
        let report = compare_lines(&lines("1000 0100"), &lines("0010 0001 0011"), "a", "b");
        assert_eq!(report.same_line_count, 0);
        assert_eq!(report.similarity_ratio, 0.0);
        assert_eq!(report.different_line_count, 3);
    }

    #[test]
    fn empty_against_empty_is_identical() {
        let empty: Vec<&str> = Vec::new();
        let report = compare_lines(&empty, &empty, "a", "b");
        assert_eq!(report.similarity_ratio, 1.0);
        assert!(report.is_identical());
    }

    #[test]
    fn matches_equal_longest_common_subsequence() {
        let cases = [
            ("a b c a b b a", "c b a b a c"),
            ("x y z", "y z x"),
            ("a a a b", "b a a a"),
            ("1 2 3 4 5 6", "1 3 5 7 2 4 6"),
            ("p q", "r s t q p"),
        ];
        for (left, right) in cases {
            let a = lines(left);
            let b = lines(right);
            let report = compare_lines(&a, &b, "a", "b");
            assert_eq!(report.same_line_count, lcs_len(&a, &b), "{left} vs {right}");
        }
    }

    #[test]
    fn scattered_edits_keep_the_longest_common_subsequence() {
        let a: Vec<String> = (0..400).map(|index| (index % 7).to_string()).collect();
        let b: Vec<String> = (0..380).map(|index| (index * 3 % 11).to_string()).collect();
        let a_lines: Vec<&str> = a.iter().map(String::as_str).collect();
        let b_lines: Vec<&str> = b.iter().map(String::as_str).collect();

        let report = compare_lines(&a_lines, &b_lines, "a", "b");
        assert_eq!(report.same_line_count, lcs_len(&a_lines, &b_lines));
    }

    #[test]
    fn long_disjoint_inputs_share_nothing() {
        let a: Vec<String> = (0..4000).map(|index| format!("a{index}")).collect();
        let b: Vec<String> = (0..4000).map(|index| format!("b{index}")).collect();

        let report = compare_lines(&a, &b, "a", "b");
        assert_eq!(report.same_line_count, 0);
        assert_eq!(report.similarity_ratio, 0.0);
        assert_eq!(report.different_line_count, 4000);
    }

    #[test]
    fn unified_diff_follows_conventional_layout() {
        let a = lines("l1 l2 l3 l4 l5 l6 l7 l8 l9 l10");
        let b = lines("l1 l2 l3 l4 X5 l6 l7 l8 l9 l10 l11");
        let report = compare_lines(&a, &b, "old", "new");
        let expected = "--- old\n+++ new\n@@ -2,9 +2,10 @@\n l2\n l3\n l4\n-l5\n+X5\n l6\n l7\n l8\n l9\n l10\n+l11\n";
        assert_eq!(report.unified_diff, expected);
    }

    #[test]
    fn distant_changes_produce_separate_hunks() {
        let a = lines("a b c d e f g h i j k l");
        let b = lines("A b c d e f g h i j k L");
        let report = compare_lines(&a, &b, "old", "new");
        let hunks = report
            .unified_diff
            .lines()
            .filter(|line| line.starts_with("@@"))
            .collect::<Vec<_>>();
        assert_eq!(hunks, vec!["@@ -1,4 +1,4 @@", "@@ -9,4 +9,4 @@"]);
    }

    #[test]
    fn opcodes_cover_both_sequences() {
        let codes = opcodes(&lines("a b c d"), &lines("a x c d e"));
        let tags: Vec<OpTag> = codes.iter().map(|code| code.tag).collect();
        assert_eq!(
            tags,
            vec![OpTag::Equal, OpTag::Replace, OpTag::Equal, OpTag::Insert]
        );
        assert_eq!(codes[3].b_start, 4);
        assert_eq!(codes[3].b_end, 5);
    }

    #[test]
    fn insertion_into_empty_side_uses_zero_length_range() {
        let empty: Vec<&str> = Vec::new();
        let report = compare_lines(&empty, &lines("x y"), "old", "new");
        assert!(report.unified_diff.contains("@@ -0,0 +1,2 @@"));
    }

    #[test]
    fn grid_comparison_ignores_metadata_and_counts_lines() {
        let original = parse_body("1000\n0100\n,\n0010\n0001\n;");
        let edited = parse_body("1000\n0100\n,\n0011\n0001\n;");
        let report = compare(&original, 2, &edited, 0);

        assert_eq!(report.total_lines_a, 6);
        assert_eq!(report.same_line_count, 5);
        assert_eq!(report.different_line_count, 1);
        assert_eq!(report.level_a, 2);
        assert!(report.unified_diff.starts_with("--- chart a (level 2)\n"));
    }
}
