//! Chart rendering with Plotters and console tables

use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::correlation::CorrelationBlock;
use crate::dashboard::DashboardReport;
use crate::features::{slugify, Churn, Level};
use crate::filter::Location;
use crate::metrics::{BinaryMetrics, ClassificationReport, ModelEvaluation, ReportRow};
use crate::summary::{ChurnPair, GroupedCounts, SegmentSummary};

/// Loyal customers
const LOYAL_COLOR: RGBColor = RGBColor(0x00, 0x3f, 0x5c);
/// Customers who left
const CHURNED_COLOR: RGBColor = RGBColor(0xff, 0xa6, 0x00);

fn churn_color(churn: Churn) -> RGBColor {
    match churn {
        Churn::Loyal => LOYAL_COLOR,
        Churn::Churned => CHURNED_COLOR,
    }
}

/// Linear blend between two colors, `t` in [0, 1]
fn blend(from: (f64, f64, f64), to: (f64, f64, f64), t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    RGBColor(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

/// Diverging blue-white-red scale for coefficients in [-1, 1]
fn coolwarm(value: f64) -> RGBColor {
    const COOL: (f64, f64, f64) = (59.0, 76.0, 192.0);
    const NEUTRAL: (f64, f64, f64) = (221.0, 221.0, 221.0);
    const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);
    if value < 0.0 {
        blend(NEUTRAL, COOL, -value)
    } else {
        blend(NEUTRAL, WARM, value)
    }
}

/// Sequential white-to-blue scale for scores in [0, 1]
fn blues(value: f64) -> RGBColor {
    blend((247.0, 251.0, 255.0), (8.0, 48.0, 107.0), value)
}

/// Label of the tick nearest to an integer position, blank elsewhere
fn tick_label(labels: &[String], position: f64) -> String {
    let index = position.round();
    if (position - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    labels.get(index as usize).cloned().unwrap_or_default()
}

/// Pie chart of loyal vs churned customers
pub fn create_churn_pie(pair: &ChurnPair, title: &str, output_path: &Path) -> anyhow::Result<()> {
    let root = BitMapBackend::new(output_path, (600, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    let area = root.titled(title, ("sans-serif", 24))?;

    let dims = area.dim_in_pixel();
    let center = (dims.0 as i32 / 2, dims.1 as i32 / 2);
    let radius = f64::from(dims.0.min(dims.1)) * 0.38;
    let sizes = vec![pair.loyal as f64, pair.churned as f64];
    let colors = vec![LOYAL_COLOR, CHURNED_COLOR];
    let labels = vec![Churn::Loyal.pie_label(), Churn::Churned.pie_label()];

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.start_angle(85.0);
    pie.label_style(("sans-serif", 16).into_font().color(&BLACK));
    pie.percentages(("sans-serif", 16).into_font().color(&WHITE));
    area.draw(&pie)?;

    root.present()?;
    Ok(())
}

/// Grouped bar chart of churn counts per category
pub fn create_count_chart(
    grouped: &GroupedCounts,
    categories: &[(i64, String)],
    x_desc: &str,
    output_path: &Path,
) -> anyhow::Result<()> {
    let labels: Vec<String> = categories.iter().map(|(_, label)| label.clone()).collect();
    let n = categories.len().max(1) as f64;
    let max_count = grouped.max_count().max(1) as f64;

    let root = BitMapBackend::new(output_path, (700, 450)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Count Plot {} vs Churn Label", x_desc), ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n - 0.5), 0f64..(max_count * 1.15))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(categories.len().max(1))
        .x_label_formatter(&|x| tick_label(&labels, *x))
        .x_desc(x_desc)
        .y_desc("Count")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for churn in Churn::ALL {
        let color = churn_color(churn);
        let (left, right) = match churn {
            Churn::Loyal => (-0.38, 0.0),
            Churn::Churned => (0.0, 0.38),
        };
        let bars: Vec<(f64, f64, usize)> = categories
            .iter()
            .enumerate()
            .map(|(i, (code, _))| (i as f64 + left, i as f64 + right, grouped.count(*code, churn)))
            .collect();

        chart
            .draw_series(bars.iter().map(|&(x0, x1, count)| {
                Rectangle::new([(x0, 0.0), (x1, count as f64)], color.filled())
            }))?
            .label(churn.legend())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));

        chart.draw_series(bars.iter().map(|&(x0, x1, count)| {
            Text::new(
                count.to_string(),
                ((x0 + x1) / 2.0, count as f64 + max_count * 0.02),
                ("sans-serif", 12),
            )
        }))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Annotated heatmap; `color` maps a cell value to its fill
fn create_heatmap(
    title: &str,
    row_labels: &[String],
    column_labels: &[String],
    values: &ndarray::Array2<f64>,
    color: fn(f64) -> RGBColor,
    output_path: &Path,
) -> anyhow::Result<()> {
    let rows = row_labels.len().max(1) as f64;
    let columns = column_labels.len().max(1) as f64;

    let root = BitMapBackend::new(output_path, (900, 650)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(80)
        .y_label_area_size(240)
        .build_cartesian_2d(-0.5f64..(columns - 0.5), -0.5f64..(rows - 0.5))?;

    // Row 0 is drawn at the top
    let flipped_rows: Vec<String> = row_labels.iter().rev().cloned().collect();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(column_labels.len().max(1))
        .y_labels(row_labels.len().max(1))
        .x_label_formatter(&|x| tick_label(column_labels, *x))
        .y_label_formatter(&|y| tick_label(&flipped_rows, *y))
        .draw()?;

    let cells: Vec<(f64, f64, f64)> = values
        .indexed_iter()
        .map(|((i, j), v)| (j as f64, rows - 1.0 - i as f64, *v))
        .collect();

    chart.draw_series(cells.iter().map(|&(x, y, v)| {
        Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], color(v).filled())
    }))?;
    chart.draw_series(cells.iter().map(|&(x, y, v)| {
        Text::new(format!("{:.2}", v), (x - 0.12, y), ("sans-serif", 14))
    }))?;

    root.present()?;
    Ok(())
}

/// Heatmap of a feature's correlation block
pub fn create_correlation_heatmap(
    block: &CorrelationBlock,
    title: &str,
    output_path: &Path,
) -> anyhow::Result<()> {
    create_heatmap(
        title,
        &block.row_labels,
        &block.column_labels,
        &block.values,
        coolwarm,
        output_path,
    )
}

/// Heatmap of precision, recall and F1 per report row
pub fn create_report_heatmap(report: &ClassificationReport, output_path: &Path) -> anyhow::Result<()> {
    let rows = report.rows();
    let row_labels = vec!["precision".to_string(), "recall".to_string(), "f1-score".to_string()];
    let column_labels: Vec<String> = rows.iter().map(|r| r.label.clone()).collect();
    let values = ndarray::Array2::from_shape_fn((3, rows.len()), |(i, j)| match i {
        0 => rows[j].precision,
        1 => rows[j].recall,
        _ => rows[j].f1,
    });
    create_heatmap(
        "Classification Random Forest Report",
        &row_labels,
        &column_labels,
        &values,
        blues,
        output_path,
    )
}

/// Every code present in the grouped counts with its display label,
/// including levels that are counted but not compared
pub fn count_categories(summary: &SegmentSummary) -> Vec<(i64, String)> {
    summary
        .grouped
        .pairs
        .keys()
        .map(|&code| (code, summary.feature.category_label(code)))
        .collect()
}

/// Render every chart of a dashboard pass into `output_dir`
///
/// # Arguments
/// * `report` - Result of a dashboard pass
/// * `evaluation` - Model scores; the classification report chart is skipped when `None`
/// * `output_dir` - Directory for the PNG files, created if missing
///
/// # Returns
/// * Paths of the written charts, in dashboard order
pub fn generate_dashboard_charts(
    report: &DashboardReport,
    evaluation: Option<&ModelEvaluation>,
    output_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    let path = output_dir.join("overview_pie.png");
    create_churn_pie(&report.overall, "Differential Of Churn", &path)?;
    written.push(path);

    let locations: Vec<(i64, String)> = report
        .locations
        .iter()
        .map(|l| l.code())
        .zip(location_ticks(&report.locations))
        .collect();
    let path = output_dir.join("location_counts.png");
    create_count_chart(&report.location_counts, &locations, "Location", &path)?;
    written.push(path);

    for section in &report.sections {
        let feature = &section.summary.feature;
        let slug = feature.slug();
        let categories = count_categories(&section.summary);

        let path = output_dir.join(format!("{}_counts.png", slug));
        create_count_chart(&section.summary.grouped, &categories, feature.column, &path)?;
        written.push(path);

        for split in &section.summary.splits {
            let Ok(pair) = &split.outcome else { continue };
            let path = output_dir.join(format!(
                "{}_{}_pie.png",
                slug,
                slugify(split.level.label)
            ));
            create_churn_pie(pair, &pie_title(feature.column, &split.level), &path)?;
            written.push(path);
        }

        let path = output_dir.join(format!("{}_correlation.png", slug));
        create_correlation_heatmap(
            &section.correlation,
            &format!("{} Correlation", feature.column),
            &path,
        )?;
        written.push(path);
    }

    if let Some(evaluation) = evaluation {
        let path = output_dir.join("classification_report.png");
        create_report_heatmap(&evaluation.report, &path)?;
        written.push(path);
    }

    Ok(written)
}

fn pie_title(column: &str, level: &Level) -> String {
    format!("{}: {}", column, level.label)
}

/// Print the dashboard sections to the console
pub fn print_dashboard(report: &DashboardReport) {
    println!("\n=== Differential Of Churn ===");
    println!("Location: {}", report.caption());
    println!("Customers: {}", report.customers);
    print_pair("All customers", &report.overall);

    println!("\nChurn by location:");
    for location in &report.locations {
        print_pair(location.name(), &report.location_counts.pair(location.code()));
    }

    println!("\n=== Analysis Result ===");
    for section in &report.sections {
        let summary = &section.summary;
        println!("\n--- {} Comparison ---", summary.feature.column);
        println!("  Counts:");
        for (code, label) in count_categories(summary) {
            print_pair(&label, &summary.grouped.pair(code));
        }
        println!("  Compared levels:");
        for split in &summary.splits {
            if let Ok(pair) = &split.outcome {
                print_pair(split.level.label, pair);
            }
        }

        println!("  Correlation:");
        for (i, label) in section.correlation.row_labels.iter().enumerate() {
            let row: Vec<String> = section
                .correlation
                .values
                .row(i)
                .iter()
                .map(|v| format!("{:6.2}", v))
                .collect();
            println!("    {:<32} {}", label, row.join(" "));
        }
    }
}

fn print_pair(label: &str, pair: &ChurnPair) {
    println!(
        "  {:<20} loyal {:>6} | left {:>6} | churn rate {:5.1}%",
        label,
        pair.loyal,
        pair.churned,
        pair.churn_rate()
    );
}

fn print_metrics(partition: &str, metrics: &BinaryMetrics) {
    println!("{}:", partition);
    println!("  Accuracy:  {:.2}", metrics.accuracy);
    println!("  F1 Score:  {:.2}", metrics.f1);
    println!("  Precision: {:.2}", metrics.precision);
    println!("  Recall:    {:.2}", metrics.recall);
    match metrics.roc_auc {
        Some(auc) => println!("  ROC AUC:   {:.2}", auc),
        None => println!("  ROC AUC:   n/a"),
    }
}

/// Print held-out scores and the classification report
pub fn print_evaluation(evaluation: &ModelEvaluation) {
    println!("\n=== Classification Random Forest Report ===");
    print_metrics(&format!("Data Train ({} rows)", evaluation.train_size), &evaluation.train);
    print_metrics(&format!("Data Test ({} rows)", evaluation.test_size), &evaluation.test);

    println!("\n  {:<14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support");
    let report = &evaluation.report;
    for row in &report.classes {
        print_report_row(row);
    }
    println!(
        "  {:<14} {:>9} {:>9} {:>9.2} {:>9}",
        "accuracy", "", "", report.accuracy, report.macro_avg.support
    );
    print_report_row(&report.macro_avg);
    print_report_row(&report.weighted_avg);
}

fn print_report_row(row: &ReportRow) {
    println!(
        "  {:<14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        row.label, row.precision, row.recall, row.f1, row.support
    );
}

/// Names of the selected locations, for count-plot ticks
pub fn location_ticks(locations: &[Location]) -> Vec<String> {
    locations.iter().map(|l| l.name().to_string()).collect()
}
