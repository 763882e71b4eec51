//! Credit transfer message example
//!
//! This example builds a batched pain.001.001.03 document with payments on
//! two execution dates, prints the summary, and renders the final XML.

use sepa_pain001::{
    MessageConfig, PaymentInstruction, SepaCreditTransfer, SequenceType, SchemaVersion,
};

fn main() -> Result<(), sepa_pain001::Error> {
    println!("=== SEPA Credit Transfer Builder ===\n");

    let config = MessageConfig::new("Acme BV", "NL91ABNA0417164300", "EUR", true)
        .with_bic("ABNANL2A")
        .with_debitor_id("ACME-0001")
        .with_version(SchemaVersion::V3);

    let mut message = SepaCreditTransfer::new(config)?;
    println!("Message id: {}", message.message_id());

    // Two salary payments sharing one batch (same type, same date).
    for (name, iban, amount) in [
        ("Test von Testenstein", "GB82WEST12345698765432", "125000"),
        ("Erika Mustermann", "DE89370400440532013000", "98050"),
    ] {
        let end_to_end_id = message.add_payment(&PaymentInstruction {
            name: name.to_string(),
            iban: iban.to_string(),
            amount: amount.to_string(),
            execution_date: "2024-01-25".to_string(),
            description: "Salary January 2024".to_string(),
            sequence_type: Some(SequenceType::Rcur),
            ..Default::default()
        })?;
        println!("Accepted {} -> {}", name, end_to_end_id);
    }

    // A one-off payment on a later date opens a second batch.
    message.add_payment(&PaymentInstruction {
        name: "Test von Testenstein".to_string(),
        iban: "GB82WEST12345698765432".to_string(),
        amount: "5000".to_string(),
        execution_date: "2024-02-01".to_string(),
        description: "Expense reimbursement".to_string(),
        end_to_end_id: Some("EXP-2024-0042".to_string()),
        sequence_type: Some(SequenceType::Ooff),
        ..Default::default()
    })?;

    let summary = message.summary();
    println!("\nBatches:");
    for batch in &summary.batches {
        let sequence = batch
            .sequence_type
            .map(|t| t.code())
            .unwrap_or("-");
        println!(
            "  {} {} [{}]: {} transactions, {} minor units",
            sequence, batch.execution_date, batch.batch_id, batch.transaction_count, batch.amount
        );
    }
    println!(
        "Totals: {} transactions, {} minor units",
        summary.total_transactions, summary.total_amount
    );

    let xml = message.save()?;
    println!(
        "\nValidate against {} before submission.",
        message.schema_version().schema_file()
    );
    println!("\n{}", xml);

    Ok(())
}
