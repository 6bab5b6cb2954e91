use pretty_assertions::assert_eq;
use proptest::prelude::*;
use stepgauge_core::{
    StepgaugeError, extract_chart_body,
    fixtures::{demo_chart_text, demo_document},
    parse_body, parse_chart, render_section, set_subtitle, splice_section,
};

const GENERATED_RESPONSE: &str = "\
Sure! Here is a simplified Beginner chart:

```
1000
0000
0000
0000
0100
0000
0000
0000
,
0010
0000
0001
0000
;
```

Let me know if you want more notes.
";

#[test]
fn generated_body_survives_reconstruction() {
    let source = demo_chart_text();
    let document = demo_document();
    let beginner = &document.sections[0];

    let generated = extract_chart_body(GENERATED_RESPONSE).expect("response holds a chart");
    let rendered = render_section(&beginner.meta, &generated);
    let spliced = splice_section(source, beginner, &rendered).expect("span matches source");
    let rebuilt = set_subtitle(&spliced, "Learning Mode");

    let reparsed = parse_chart(&rebuilt);
    assert_eq!(reparsed.sections.len(), document.sections.len());
    assert_eq!(reparsed.sections[0].grid, generated);
    assert_eq!(reparsed.sections[0].meta, beginner.meta);
    assert_eq!(reparsed.sections[1].grid, document.sections[1].grid);
    assert_eq!(reparsed.header.subtitle, "Learning Mode");
    assert_eq!(reparsed.tempo, document.tempo);
}

#[test]
fn splicing_into_foreign_text_is_refused() {
    let document = demo_document();
    let error = splice_section("#TITLE:short;", &document.sections[1], "x")
        .expect_err("span lies outside the text");
    assert_eq!(error, StepgaugeError::SectionSpanMissing(1));
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 96,
        .. ProptestConfig::default()
    })]

    #[test]
    fn rendered_sections_reparse_to_the_same_grid(
        measures in prop::collection::vec(prop::collection::vec("[01234M]{4}", 1..12), 1..8),
    ) {
        let body = measures
            .iter()
            .map(|rows| rows.join("\n"))
            .collect::<Vec<_>>()
            .join("\n,\n");
        let grid = parse_body(&body);
        let meta = demo_document().sections[0].meta.clone();

        let reparsed = parse_chart(&render_section(&meta, &grid));
        prop_assert_eq!(reparsed.sections.len(), 1);
        prop_assert_eq!(&reparsed.sections[0].grid, &grid);
        prop_assert_eq!(&reparsed.sections[0].meta, &meta);
    }

    #[test]
    fn fenced_bodies_extract_like_parse_body(
        rows in prop::collection::vec("[0123M]{4}", 11..40),
    ) {
        let mut block = String::new();
        for (index, row) in rows.iter().enumerate() {
            block.push_str(row);
            block.push('\n');
            if index % 4 == 3 {
                block.push_str(",\n");
            }
        }
        block.push_str(";\n");
        let text = format!("chart follows\n```text\n{block}```\ndone\n");

        let extracted = extract_chart_body(&text).expect("fenced chart should be found");
        prop_assert_eq!(extracted, parse_body(&block));
    }
}
