//! Terminal rendering of query tables
use colored::*;
use election_insights::analytics::derived::WithParticipation;
use election_insights::analytics::{
    CandidateRegionRow, NationalParticipationRow, NationalTendencyRow, RegionalParticipationRow,
    RegionalTendencyRow, ThresholdRow,
};
use election_insights::database::ingestion::IngestionSummary;
use itertools::Itertools;
use serde::Serialize;

pub fn print_json<T: Serialize + ?Sized>(rows: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(rows)?);
    Ok(())
}

fn format_pct(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.2} %", value),
        None => "n/a".to_string(),
    }
}

fn print_table(title: &str, headers: &[&str], rows: &[Vec<String>]) {
    println!("\n{}", title.bright_cyan().bold());
    if rows.is_empty() {
        println!("{}", "(no rows)".dimmed());
        return;
    }

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    println!(
        "{}",
        pad_row(headers.iter().copied(), &widths).bright_white().bold()
    );
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).join("-+-").bright_cyan()
    );
    for row in rows {
        println!("{}", pad_row(row.iter().map(String::as_str), &widths));
    }
}

fn pad_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .join(" | ")
}

pub fn print_departments(names: &[String]) {
    let rows: Vec<Vec<String>> = names.iter().map(|name| vec![name.clone()]).collect();
    print_table("Departements", &["department_name"], &rows);
}

pub fn print_national_participation(title: &str, rows: &[WithParticipation<NationalParticipationRow>]) {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.row.annee.clone(),
                r.row.inscripts.to_string(),
                r.row.votants.to_string(),
                r.row.nullparts.to_string(),
                r.row.exprimes.to_string(),
                format_pct(r.participation),
            ]
        })
        .collect();
    print_table(
        title,
        &["annee", "inscripts", "votants", "nullparts", "exprimes", "participation"],
        &rows,
    );
}

pub fn print_regional_participation(title: &str, rows: &[WithParticipation<RegionalParticipationRow>]) {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.row.annee.clone(),
                r.row.region.clone(),
                r.row.inscripts.to_string(),
                r.row.votants.to_string(),
                r.row.nullparts.to_string(),
                r.row.exprimes.to_string(),
                format_pct(r.participation),
            ]
        })
        .collect();
    print_table(
        title,
        &["annee", "Region", "inscripts", "votants", "nullparts", "exprimes", "participation"],
        &rows,
    );
}

fn courant_label(courant: &Option<String>) -> String {
    courant.clone().unwrap_or_else(|| "null".to_string())
}

pub fn print_national_tendency(title: &str, rows: &[NationalTendencyRow]) {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| vec![r.annee.clone(), courant_label(&r.courant), r.resultat.to_string()])
        .collect();
    print_table(title, &["annee", "courant", "resultat"], &rows);
}

pub fn print_regional_tendency(title: &str, rows: &[RegionalTendencyRow]) {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.annee.clone(),
                r.region.clone(),
                courant_label(&r.courant),
                r.resultat.to_string(),
            ]
        })
        .collect();
    print_table(title, &["annee", "Region", "courant", "resultat"], &rows);
}

pub fn print_candidate(title: &str, rows: &[CandidateRegionRow]) {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| vec![r.department_name.clone(), format!("{:.2}", r.resultat)])
        .collect();
    print_table(title, &["department_name", "resultat"], &rows);
}

pub fn print_threshold(title: &str, rows: &[ThresholdRow]) {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.department_code.to_string(),
                r.department_name.clone(),
                r.annee.clone(),
                format_pct(r.rs),
            ]
        })
        .collect();
    print_table(title, &["department_code", "department_name", "annee", "rs"], &rows);
}

pub fn print_ingestion_summary(summary: &IngestionSummary) {
    println!("\n{}", "🎉 Load Complete!".bright_green().bold());
    println!("{}", "=".repeat(50).bright_green());
    println!(
        "{}: {}",
        "Regions".bright_white().bold(),
        summary.regions.to_string().bright_yellow()
    );
    println!(
        "{}: {} ({} candidate-party bindings)",
        "Candidates".bright_white().bold(),
        summary.candidates.to_string().bright_yellow(),
        summary.candidate_parties.to_string().bright_yellow()
    );
    println!(
        "{}: {} ({} results)",
        "Ballots".bright_white().bold(),
        summary.ballots.to_string().bright_yellow(),
        summary.results.to_string().bright_yellow()
    );
    println!(
        "{}: {} ms",
        "Total Duration".bright_white().bold(),
        summary.total_duration_ms.to_string().bright_yellow()
    );

    if !summary.warnings.is_empty() {
        println!(
            "{}: {}",
            "Data Quality Warnings".bright_red().bold(),
            summary.warnings.len().to_string().bright_red()
        );
        for warning in &summary.warnings {
            println!("  ⚠️  {}", warning);
        }
    }
    println!();
}
