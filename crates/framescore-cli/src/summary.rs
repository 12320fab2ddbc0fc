use console::Style;
use framescore_core::aggregate::ColumnStatistics;
use framescore_core::compose::Reduction;
use framescore_core::config::ScoreConfig;
use framescore_core::sequence::Sequence;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn underline(title: &str) -> String {
    "\u{2550}".repeat(title.chars().count())
}

pub fn print_score_summary(config: &ScoreConfig, scored: &Sequence) {
    let s = Styles::new();
    let title = "Frame Scoring";

    println!();
    println!("  {}", s.title.apply_to(title));
    println!("  {}", s.title.apply_to(underline(title)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Reference"),
        s.path.apply_to(config.reference.display())
    );
    match config.distorted {
        Some(ref distorted) => println!(
            "  {:<14}{}",
            s.label.apply_to("Distorted"),
            s.path.apply_to(distorted.display())
        ),
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Distorted"),
            s.disabled.apply_to("none")
        ),
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Metric"),
        s.method.apply_to(config.metric.kind())
    );

    match config.reduction {
        Some(Reduction::Crop { percentage }) => println!(
            "  {:<14}{}",
            s.label.apply_to("Reduction"),
            s.value.apply_to(format!("crop {percentage}%"))
        ),
        Some(Reduction::Downsample { percentage }) => println!(
            "  {:<14}{}",
            s.label.apply_to("Reduction"),
            s.value.apply_to(format!("downsample {percentage}%"))
        ),
        Some(Reduction::Hybrid { chunks, frame_step }) => println!(
            "  {:<14}{}",
            s.label.apply_to("Reduction"),
            s.value
                .apply_to(format!("hybrid {chunks}x{chunks} tiles, every {frame_step} frame(s)"))
        ),
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Reduction"),
            s.disabled.apply_to("none")
        ),
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Scored"),
        s.value.apply_to(scored.describe())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Read-ahead"),
        s.value.apply_to(config.read_ahead)
    );
    println!();
}

pub fn print_statistics(title: &str, stats: &[(String, ColumnStatistics)]) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to(title));
    println!("  {}", s.header.apply_to(underline(title)));
    println!(
        "  {:<32}{:>12}{:>12}{:>12}{:>12}{:>12}",
        s.label.apply_to("Column"),
        s.label.apply_to("Mean"),
        s.label.apply_to("Median"),
        s.label.apply_to("Std"),
        s.label.apply_to("P5"),
        s.label.apply_to("P95"),
    );
    for (name, st) in stats {
        println!(
            "  {:<32}{:>12.6}{:>12.6}{:>12.6}{:>12.6}{:>12.6}",
            s.value.apply_to(name),
            st.mean,
            st.median,
            st.std_dev,
            st.p5,
            st.p95
        );
    }
    println!();
}
