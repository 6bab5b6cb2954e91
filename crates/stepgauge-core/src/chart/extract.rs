use tracing::{debug, instrument};

use super::{
    model::NoteGrid,
    parser::{BodyLine, GridBuilder, classify_line, parse_body},
};

const FENCE: &str = "```";
const MIN_FENCED_ROWS: usize = 10;

/// Recovers a chart body from free-form text such as a generated answer.
///
/// Fenced code blocks are tried first; the first block holding more than ten
/// rows and at least one separator or terminator wins. Otherwise the longest
/// contiguous run of body lines is used. Returns `None` when no row is found.
#[instrument(skip(text), fields(bytes = text.len()))]
pub fn extract_chart_body(text: &str) -> Option<NoteGrid> {
    if let Some(block) = fenced_blocks(text)
        .into_iter()
        .find(|block| looks_like_chart(block))
    {
        debug!("chart body found in fenced block");
        return Some(parse_body(block));
    }

    let run = longest_body_run(text)?;
    debug!(lines = run.len(), "chart body found in unfenced text");
    let mut builder = GridBuilder::default();
    for line in run {
        if !builder.accept(line) {
            break;
        }
    }
    Some(builder.finish())
}

fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(FENCE) {
        let after_fence = &rest[open + FENCE.len()..];
        // skip an info string such as ```sm
        let content = after_fence
            .find('\n')
            .map_or(after_fence, |newline| &after_fence[newline + 1..]);
        let Some(close) = content.find(FENCE) else {
            break;
        };
        blocks.push(&content[..close]);
        rest = &content[close + FENCE.len()..];
    }
    blocks
}

fn looks_like_chart(block: &str) -> bool {
    let mut rows = 0;
    let mut separators = 0;
    for line in block.lines() {
        match classify_line(line) {
            BodyLine::Row(_) => rows += 1,
            BodyLine::Separator | BodyLine::Terminator => separators += 1,
            BodyLine::Other => {}
        }
    }
    rows > MIN_FENCED_ROWS && separators > 0
}

fn longest_body_run(text: &str) -> Option<Vec<BodyLine>> {
    let mut best: Vec<BodyLine> = Vec::new();
    let mut best_rows = 0;
    let mut current: Vec<BodyLine> = Vec::new();
    let mut current_rows = 0;

    let mut close_run = |run: &mut Vec<BodyLine>, rows: &mut usize| {
        if *rows > best_rows {
            best_rows = *rows;
            best = std::mem::take(run);
        } else {
            run.clear();
        }
        *rows = 0;
    };

    for line in text.lines() {
        match classify_line(line) {
            BodyLine::Other if line.trim().is_empty() => {}
            BodyLine::Other => close_run(&mut current, &mut current_rows),
            BodyLine::Terminator => {
                if current_rows > 0 {
                    current.push(BodyLine::Terminator);
                }
                close_run(&mut current, &mut current_rows);
            }
            BodyLine::Separator => {
                if current_rows > 0 {
                    current.push(BodyLine::Separator);
                }
            }
            row @ BodyLine::Row(_) => {
                current.push(row);
                current_rows += 1;
            }
        }
    }
    close_run(&mut current, &mut current_rows);

    (best_rows > 0).then_some(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart_block(rows: usize) -> String {
        let mut block = String::new();
        for index in 0..rows {
            block.push_str(["1000\n", "0100\n", "0010\n", "0001\n"][index % 4]);
            if index % 4 == 3 {
                block.push_str(",\n");
            }
        }
        block.push_str(";\n");
        block
    }

    #[test]
    fn fenced_block_is_preferred() {
        let block = chart_block(12);
        let text = format!("Here is the chart:\n```sm\n{block}```\nand 1111 trailing notes\n1111\n");
        let grid = extract_chart_body(&text).expect("fenced chart should be found");
        assert_eq!(grid, parse_body(&block));
    }

    #[test]
    fn short_fenced_block_falls_back_to_longest_run() {
        let text = "```\n1000\n;\n```\nchart:\n1000\n0100\n\n0010\n,\n0001\n;\nbye\n";
        let grid = extract_chart_body(text).expect("unfenced chart should be found");
        assert_eq!(grid.row_count(), 4);
        assert_eq!(grid.measure_count(), 2);
    }

    #[test]
    fn text_without_rows_yields_nothing() {
        assert!(extract_chart_body("no chart here, sorry;").is_none());
    }
}
