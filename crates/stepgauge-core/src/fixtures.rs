use crate::chart::{ChartDocument, parse_chart};

const DEMO_CHART: &str = "\
#TITLE:Stepgauge Demo;
#SUBTITLE:;
#ARTIST:Fixture Band;
#MUSIC:demo.ogg;
#OFFSET:-0.012;
#BPMS:0.000=120.000,8.000=240.000;

//---------------dance-single - Beginner----------------
#NOTES:
     dance-single:
     fixture:
     Beginner:
     2:
     0.120,0.050,0.000,0.000,0.000:
1000
0000
0100
0000
,
0010
0000
0001
0000
,
1000
0100
0010
0001
;

//---------------dance-single - Medium----------------
#NOTES:
     dance-single:
     fixture:
     Medium:
     6:
     0.400,0.300,0.100,0.000,0.050:
1000
0100
0010
0001
1000
0100
0010
0001
,
1001
0000
0110
0000
,
2000
0000
3000
0000
,
M000
0100
0010
1001
;
";

const DEMO_VARIANT_CHART: &str = "\
#TITLE:Stepgauge Demo;
#SUBTITLE:Learning Mode;
#ARTIST:Fixture Band;
#MUSIC:demo.ogg;
#OFFSET:-0.012;
#BPMS:0.000=120.000,8.000=240.000;

#NOTES:
     dance-single:
     generator:
     Beginner:
     2:
     0.120,0.050,0.000,0.000,0.000:
1000
0000
0100
0000
,
0010
0000
0011
0000
,
1000
0100
0010
0001
;
";

const DEMO_REPLAY: &str = "\
# replay v1
0 0.010 0
48 -0.030 1
96 0.060 2
144 0.100 3
192 -0.150 0 3
240 0.300 1
288 0.000 2
";

/// Two levels (Beginner, Medium) and a tempo change at beat 8.
#[must_use]
pub fn demo_chart_text() -> &'static str {
    DEMO_CHART
}

/// Beginner-only variant of [`demo_chart_text`] with one edited row.
#[must_use]
pub fn demo_variant_chart_text() -> &'static str {
    DEMO_VARIANT_CHART
}

#[must_use]
pub fn demo_replay_text() -> &'static str {
    DEMO_REPLAY
}

#[must_use]
pub fn demo_document() -> ChartDocument {
    parse_chart(DEMO_CHART)
}
