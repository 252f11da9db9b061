//! User-facing output

use color_eyre::eyre::Result;
use console::style;
use kiln_core::{Error, RunReport, VerificationStatus};

/// Print the run report; deployment and verification are separate lines
pub fn report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let contract = &report.contract;
    println!();
    if contract.is_fresh() {
        println!(
            "{} {} deployed at {}",
            style("✓").green().bold(),
            style(&report.contract_name).cyan(),
            style(contract.address).yellow()
        );
    } else {
        println!(
            "{} {} live at {}",
            style("✓").green().bold(),
            style(&report.contract_name).cyan(),
            style(contract.address).yellow()
        );
    }
    println!("   Chain:       {}", contract.chain_id);
    if let Some(tx_hash) = contract.creation_tx_hash {
        println!("   Transaction: {}", tx_hash);
    }
    if !report.constructor_args.is_empty() {
        println!("   Args:        {}", style(&report.constructor_args).dim());
    }

    let Some(verification) = &report.verification else {
        println!("   Verification: {}", style("skipped").dim());
        return Ok(());
    };

    println!("   Verification: {}", styled_status(&verification.status));
    if let Some(guid) = &verification.guid {
        println!("   GUID:        {}", guid);
    }
    if let Some(detail) = &verification.detail {
        println!("   Detail:      {}", style(detail).dim());
    }
    if verification.status == VerificationStatus::Unknown {
        println!();
        println!(
            "{} Verification did not finish. Check the explorer, or run {}",
            style("!").yellow(),
            style(match &verification.guid {
                Some(guid) => format!("kiln status {}", guid),
                None => format!("kiln verify {} --address {}", report.contract_name, contract.address),
            })
            .cyan()
        );
    }

    Ok(())
}

/// Explain a fatal error before it is returned to the shell
pub fn failure(err: &Error) {
    eprintln!();
    match err {
        Error::DeploymentAmbiguous { tx_hash } => {
            eprintln!(
                "{} Transaction {} was sent but not confirmed in time.",
                style("?").yellow().bold(),
                style(tx_hash).yellow()
            );
            eprintln!("   It may still be mined. Look it up before deploying again,");
            eprintln!(
                "   then verify with {} once it is confirmed.",
                style("kiln verify <CONTRACT> --address <ADDRESS>").cyan()
            );
        }
        Error::Cancelled => {
            eprintln!(
                "{} Cancelled. Any transaction already sent may still be mined.",
                style("?").yellow().bold()
            );
        }
        Error::DeploymentReverted { tx_hash, .. } => {
            eprintln!(
                "{} Deployment reverted in {}; no contract was created.",
                style("✗").red().bold(),
                style(tx_hash).yellow()
            );
        }
        other => {
            eprintln!("{} {} [{}]", style("✗").red().bold(), other, other.code());
        }
    }
}

/// Print a single status check
pub fn status(guid: &str, status: &VerificationStatus) {
    println!("{} {}", style(guid).dim(), styled_status(status));
}

fn styled_status(status: &VerificationStatus) -> console::StyledObject<String> {
    let text = status.to_string();
    match status {
        VerificationStatus::Verified => style(text).green(),
        VerificationStatus::Rejected(_) => style(text).red(),
        VerificationStatus::Unknown => style(text).yellow(),
        VerificationStatus::Pending | VerificationStatus::InQueue => style(text).blue(),
    }
}
