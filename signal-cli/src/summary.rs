//! Plain-text rendering of a run report

use signal_core::TickerAggregate;
use signal_services::RunReport;

const TOP_N: usize = 10;

pub fn print_summary(report: &RunReport) {
    let view = &report.aggregate;
    let overview = view.overview();

    println!();
    println!("Run {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "  articles: {} analyzed, {} failed",
        report.analyzed_count(),
        report.failures().count()
    );
    println!(
        "  signals at confidence >= {:.2}: {} records across {} tickers from {} articles",
        view.min_confidence, overview.records, overview.tickers, overview.articles_with_signals
    );
    println!(
        "  bullish tickers: {}, bearish tickers: {}",
        overview.bullish_tickers, overview.bearish_tickers
    );

    print_table("Most bullish", &view.bullish());
    print_table("Most bearish", &view.bearish());
    print_table("Most mentioned", &view.most_mentioned(TOP_N));

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!();
        println!("Failed articles");
        for entry in failures {
            let kind = entry
                .failure_kind()
                .map(|k| k.to_string())
                .unwrap_or_default();
            println!("  {:<18} {:<22} {}", entry.article_id, kind, truncate(&entry.title, 60));
        }
    }
}

pub fn print_deep_dive(report: &RunReport, symbol: &str, min_confidence: f64) {
    let entries = report.deep_dive(symbol, min_confidence);
    println!();
    if entries.is_empty() {
        println!("No signals for {} at confidence >= {:.2}", symbol.to_uppercase(), min_confidence);
        return;
    }

    println!("Deep dive: {}", entries[0].record.symbol());
    for entry in entries {
        let record = entry.record;
        println!(
            "  [{}] {} impact, confidence {:.2}",
            record.sentiment, record.impact, record.confidence
        );
        if let Some(article) = entry.article {
            println!("    {}", article.title);
            if !article.source.is_empty() {
                println!("    source: {}", article.source);
            }
            if !article.url.is_empty() {
                println!("    {}", article.url);
            }
        }
        if !record.summary.is_empty() {
            println!("    summary: {}", record.summary);
        }
    }
}

fn print_table(title: &str, rows: &[&TickerAggregate]) {
    if rows.is_empty() {
        return;
    }
    println!();
    println!("{}", title);
    println!(
        "  {:<8} {:>5} {:>5} {:>5} {:>5} {:>6} {:>9}",
        "symbol", "count", "pos", "neu", "neg", "net", "mean conf"
    );
    for aggregate in rows.iter().take(TOP_N) {
        let counts = aggregate.sentiment_counts;
        println!(
            "  {:<8} {:>5} {:>5} {:>5} {:>5} {:>+6} {:>9.2}",
            aggregate.symbol,
            aggregate.count,
            counts.positive,
            counts.neutral,
            counts.negative,
            aggregate.net_score(),
            aggregate.mean_confidence
        );
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
