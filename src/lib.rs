//! # sepa-pain001
//!
//! Builder for SEPA Credit Transfer payment initiation messages
//! (ISO 20022 pain.001.001.02 / pain.001.001.03).
//!
//! ## Features
//!
//! - **Field validation**: SEPA character set, IBAN MOD97-10 checksum, BIC
//!   format, ISO dates, minor-unit amounts, end-to-end identifiers
//! - **Batching**: payments grouped into payment-information blocks keyed by
//!   sequence type and execution date, with exact running counts and control
//!   sums in integer minor units
//! - **Consistency cross-check**: header totals are recomputed from the
//!   assembled document tree at finalize, independent of the running counters
//! - **Deterministic identifiers**: time and randomness are injected, so
//!   message and payment ids are reproducible under test
//!
//! ## Example
//!
//! ```
//! use sepa_pain001::{MessageConfig, PaymentInstruction, SepaCreditTransfer, SequenceType};
//!
//! # fn main() -> Result<(), sepa_pain001::Error> {
//! let config = MessageConfig::new("Acme BV", "NL91ABNA0417164300", "EUR", true);
//! let mut message = SepaCreditTransfer::new(config)?;
//!
//! message.add_payment(&PaymentInstruction {
//!     name: "Test von Testenstein".to_string(),
//!     iban: "GB82WEST12345698765432".to_string(),
//!     amount: "1000".to_string(),
//!     execution_date: "2024-01-15".to_string(),
//!     description: "Invoice 1".to_string(),
//!     sequence_type: Some(SequenceType::Rcur),
//!     ..Default::default()
//! })?;
//!
//! let xml = message.save()?;
//! assert!(xml.contains("CstmrCdtTrfInitn"));
//! # Ok(())
//! # }
//! ```

pub mod amount;
pub mod batch;
pub mod iban;
pub mod ids;
pub mod validators;
pub mod xml;

pub use batch::{Batch, BatchKey, BatchRegistry};
pub use ids::{Clock, RandomSource, SystemClock, SystemRandom};
pub use validators::{PaymentField, Validators};
pub use xml::XmlNode;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// The XML-Schema-instance namespace carried on the document root.
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Errors reported by the message builder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A required config field is missing or empty, or a config field failed
    /// its validator. Construction fails atomically; no partial builder is
    /// produced.
    #[error("invalid config: {field} {reason}")]
    Config { field: &'static str, reason: String },

    /// A required payment field is missing or empty, or a payment field
    /// failed its validator. The rejected payment leaves the document tree,
    /// registry, and running totals untouched.
    #[error("invalid payment, error with: {field} {reason}")]
    Payment { field: &'static str, reason: String },

    /// A custom-node location resolved to zero or multiple nodes.
    #[error("node lookup failed: {0}")]
    Location(String),

    /// An operation was attempted in the wrong builder state, such as adding
    /// a payment to a finalized document.
    #[error("invalid operation: {0}")]
    State(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Which pain.001 schema variant the document targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    /// pain.001.001.02
    #[default]
    #[serde(rename = "2")]
    V2,
    /// pain.001.001.03
    #[serde(rename = "3")]
    V3,
}

impl SchemaVersion {
    /// Namespace emitted on the document root.
    pub fn namespace(&self) -> &'static str {
        match self {
            SchemaVersion::V2 => "urn:iso:std:iso:20022:tech:xsd:pain.001.001.02",
            SchemaVersion::V3 => "urn:iso:std:iso:20022:tech:xsd:pain.001.001.03",
        }
    }

    /// Schema file an external XSD validator should check the serialized
    /// document against.
    pub fn schema_file(&self) -> &'static str {
        match self {
            SchemaVersion::V2 => "pain.001.001.02.xsd",
            SchemaVersion::V3 => "pain.001.001.03.xsd",
        }
    }
}

/// Credit transfer sequence type. Used only as part of the batch key when
/// batching is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SequenceType {
    Frst,
    Rcur,
    Fnal,
    Ooff,
}

impl SequenceType {
    pub fn code(&self) -> &'static str {
        match self {
            SequenceType::Frst => "FRST",
            SequenceType::Rcur => "RCUR",
            SequenceType::Fnal => "FNAL",
            SequenceType::Ooff => "OOFF",
        }
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for SequenceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "FRST" => Ok(SequenceType::Frst),
            "RCUR" => Ok(SequenceType::Rcur),
            "FNAL" => Ok(SequenceType::Fnal),
            "OOFF" => Ok(SequenceType::Ooff),
            other => Err(format!(
                "{} is not a valid SEPA credit transfer sequence type",
                other
            )),
        }
    }
}

/// Originator-side configuration, fixed for the document's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    /// Originator (debtor) name.
    pub name: String,
    /// Originator IBAN.
    pub iban: String,
    /// Originator BIC. Optional; without it the debtor agent is reported as
    /// NOTPROVIDED.
    pub bic: Option<String>,
    /// Batched mode groups payments by (sequence type, execution date); when
    /// disabled every payment gets its own payment-information block.
    pub batch: bool,
    /// ISO currency code applied to every instructed amount.
    pub currency: String,
    /// Originator identifier reported under the initiating party.
    pub debitor_id: Option<String>,
    /// Run IBAN/BIC format and checksum validation. On by default.
    pub validate: bool,
    /// Target schema variant.
    pub version: SchemaVersion,
}

impl MessageConfig {
    pub fn new(
        name: impl Into<String>,
        iban: impl Into<String>,
        currency: impl Into<String>,
        batch: bool,
    ) -> Self {
        Self {
            name: name.into(),
            iban: iban.into(),
            bic: None,
            batch,
            currency: currency.into(),
            debitor_id: None,
            validate: true,
            version: SchemaVersion::default(),
        }
    }

    pub fn with_bic(mut self, bic: impl Into<String>) -> Self {
        self.bic = Some(bic.into());
        self
    }

    pub fn with_debitor_id(mut self, debitor_id: impl Into<String>) -> Self {
        self.debitor_id = Some(debitor_id.into());
        self
    }

    /// Enable or disable IBAN/BIC validation.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_version(mut self, version: SchemaVersion) -> Self {
        self.version = version;
        self
    }
}

/// One credit transfer instruction, supplied per `add_payment` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentInstruction {
    /// Creditor name.
    pub name: String,
    /// Creditor IBAN.
    pub iban: String,
    /// Creditor BIC, if known.
    pub bic: Option<String>,
    /// Amount in minor units (cents) as a digit string.
    pub amount: String,
    /// Requested execution date, ISO `YYYY-MM-DD`.
    pub execution_date: String,
    /// Remittance text, at most 140 SEPA characters.
    pub description: String,
    /// Caller-assigned end-to-end identifier; generated when absent.
    pub end_to_end_id: Option<String>,
    /// Sequence type, used as part of the batch key in batched mode.
    pub sequence_type: Option<SequenceType>,
}

/// Read-only aggregate view of the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub message_id: String,
    pub total_transactions: u32,
    /// Grand total in minor units, as a digit string.
    pub total_amount: String,
    /// Per-batch breakdown; empty in non-batch mode.
    pub batches: Vec<BatchSummary>,
}

impl Summary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Aggregates of one payment batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub sequence_type: Option<SequenceType>,
    pub execution_date: NaiveDate,
    pub batch_id: String,
    pub transaction_count: u32,
    /// Batch control sum in minor units, as a digit string.
    pub amount: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuilderState {
    Initialized,
    Accumulating,
    Finalized,
}

/// The pain.001 message builder.
///
/// Owns the document tree and batch registry exclusively; one builder per
/// document, serialized access only. Moves through three states: header
/// written, accumulating payments, finalized (terminal).
pub struct SepaCreditTransfer {
    config: MessageConfig,
    document: XmlNode,
    registry: BatchRegistry,
    state: BuilderState,
    message_id: String,
    random: Box<dyn RandomSource>,
}

impl std::fmt::Debug for SepaCreditTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SepaCreditTransfer")
            .field("message_id", &self.message_id)
            .finish_non_exhaustive()
    }
}

impl SepaCreditTransfer {
    /// Create a builder using wall-clock time and process randomness.
    pub fn new(config: MessageConfig) -> Result<Self> {
        Self::with_sources(config, &SystemClock, Box::new(SystemRandom))
    }

    /// Create a builder with injected time and randomness sources.
    pub fn with_sources(
        config: MessageConfig,
        clock: &dyn Clock,
        mut random: Box<dyn RandomSource>,
    ) -> Result<Self> {
        Self::check_config(&config)?;

        let message_id = ids::message_id(clock, random.as_mut());
        let created_at = clock.now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let document = Self::document_skeleton(&config, &message_id, &created_at);

        debug!(message_id = %message_id, batch = config.batch, "pain.001 builder created");

        Ok(Self {
            config,
            document,
            registry: BatchRegistry::new(),
            state: BuilderState::Initialized,
            message_id,
            random,
        })
    }

    /// The generated message identifier.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// The schema variant this document targets.
    pub fn schema_version(&self) -> SchemaVersion {
        self.config.version
    }

    /// True while no batch has been created. Meaningful in batch mode only.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Validate and add one payment. Returns the end-to-end identifier so
    /// the caller can correlate outcomes. A rejected payment leaves the
    /// builder's state exactly as it was.
    pub fn add_payment(&mut self, payment: &PaymentInstruction) -> Result<String> {
        if self.state == BuilderState::Finalized {
            return Err(Error::State("add_payment called on a finalized document"));
        }

        self.check_payment(payment)?;

        // Already validated as a bounded digit string.
        let amount_minor: u64 = payment.amount.parse().map_err(|_| Error::Payment {
            field: "amount",
            reason: "is not a minor-unit digit string".to_string(),
        })?;
        let execution_date = NaiveDate::parse_from_str(&payment.execution_date, "%Y-%m-%d")
            .map_err(|_| Error::Payment {
                field: "execution_date",
                reason: "is not a valid ISO date".to_string(),
            })?;

        let end_to_end_id = match payment.end_to_end_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => ids::payment_id(&self.config.name, self.random.as_mut()),
        };

        let transaction = Self::transaction_node(&self.config, payment, &end_to_end_id);

        if self.config.batch {
            let key = BatchKey {
                sequence_type: payment.sequence_type,
                execution_date,
            };

            // Overflow is checked before any mutation so a rejected payment
            // cannot leave a freshly created empty batch behind.
            if let Some(existing) = self.registry.find(&key) {
                if existing
                    .control_sum_minor()
                    .checked_add(amount_minor)
                    .is_none()
                {
                    return Err(Error::Payment {
                        field: "amount",
                        reason: "would overflow the batch control sum".to_string(),
                    });
                }
            }

            let position = match self.registry.position(&key) {
                Some(position) => position,
                None => {
                    let batch_id = ids::payment_id(&self.config.name, self.random.as_mut());
                    let block =
                        Self::batch_block(&self.config, &payment.execution_date, &batch_id);
                    debug!(batch_id = %batch_id, "batch created");
                    self.registry.register(Batch::new(key, batch_id, block))
                }
            };
            self.registry
                .batch_mut(position)
                .append(transaction, amount_minor);
        } else {
            let block_id = ids::payment_id(&self.config.name, self.random.as_mut());
            let block = Self::single_payment_block(&self.config, payment, &block_id, transaction);
            self.initiation_mut()?.push(block);
        }

        self.state = BuilderState::Accumulating;
        debug!(end_to_end_id = %end_to_end_id, amount_minor, "payment accepted");
        Ok(end_to_end_id)
    }

    /// Close out the document: flush pending batches into the tree in
    /// creation order, then recompute the header totals by scanning every
    /// transaction entry actually present in the tree. The scan is the
    /// cross-check against registry bookkeeping drift; the running counters
    /// are never trusted for the header.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state == BuilderState::Finalized {
            return Err(Error::State("finalize called on a finalized document"));
        }

        let mut flushed = Vec::new();
        for batch in self.registry.iter_mut() {
            let count = batch.transaction_count();
            let control_sum = amount::to_decimal(&batch.control_sum_minor().to_string());
            if let Some(mut node) = batch.take_node() {
                if let Some(n) = node.child_mut("NbOfTxs") {
                    n.set_text(count.to_string());
                }
                if let Some(n) = node.child_mut("CtrlSum") {
                    n.set_text(control_sum);
                }
                flushed.push(node);
            }
        }
        let initiation = self.initiation_mut()?;
        for node in flushed {
            initiation.push(node);
        }

        let transaction_count = self.document.descendants("CdtTrfTxInf").len();
        let amounts: Vec<&str> = self
            .document
            .descendants("InstdAmt")
            .iter()
            .filter_map(|n| n.text())
            .collect();
        let control_sum = amount::sum_decimals(amounts);

        let header = self.header_mut()?;
        if let Some(n) = header.child_mut("NbOfTxs") {
            n.set_text(transaction_count.to_string());
        }
        if let Some(n) = header.child_mut("CtrlSum") {
            n.set_text(control_sum.clone());
        }

        self.state = BuilderState::Finalized;
        debug!(transactions = transaction_count, control_sum = %control_sum, "document finalized");
        Ok(())
    }

    /// Finalize (if not already finalized) and render the document. Repeated
    /// saves re-render without touching the finalized tree.
    pub fn save(&mut self) -> Result<String> {
        if self.state != BuilderState::Finalized {
            self.finalize()?;
        }
        Ok(self.document.render())
    }

    /// Render the current document tree without changing state.
    pub fn to_xml(&self) -> String {
        self.document.render()
    }

    /// Attach a caller-defined node under the element addressed by a
    /// slash-separated path from the document root, for fields this builder
    /// does not model. The path must resolve to exactly one node.
    pub fn add_custom_node(
        &mut self,
        parent_path: &str,
        name: &str,
        value: Option<&str>,
        attributes: &[(&str, &str)],
    ) -> Result<()> {
        if self.state == BuilderState::Finalized {
            return Err(Error::State("cannot attach nodes to a finalized document"));
        }

        let mut hits = self.document.locate(parent_path);
        if hits.len() != 1 {
            return Err(Error::Location(if hits.is_empty() {
                format!("no node matches {}", parent_path)
            } else {
                format!(
                    "{} nodes match {}, expected exactly one",
                    hits.len(),
                    parent_path
                )
            }));
        }

        let mut node = XmlNode::new(name);
        if let Some(text) = value {
            if !text.is_empty() {
                node.set_text(text);
            }
        }
        for (attr_name, attr_value) in attributes {
            node.set_attr(*attr_name, *attr_value);
        }

        let index_path = hits.remove(0);
        self.document.node_at_mut(&index_path).push(node);
        Ok(())
    }

    /// Aggregate view: message id plus per-batch and total counts/amounts.
    /// In non-batch mode the totals are derived by scanning the tree exactly
    /// as finalize does.
    pub fn summary(&self) -> Summary {
        let mut batches = Vec::new();
        let (total_transactions, total_amount) = if self.config.batch {
            let mut count = 0u32;
            let mut total: u128 = 0;
            for batch in self.registry.iter() {
                count += batch.transaction_count();
                total += u128::from(batch.control_sum_minor());
                batches.push(BatchSummary {
                    sequence_type: batch.key().sequence_type,
                    execution_date: batch.key().execution_date,
                    batch_id: batch.id().to_string(),
                    transaction_count: batch.transaction_count(),
                    amount: batch.control_sum_minor().to_string(),
                });
            }
            (count, total.to_string())
        } else {
            let count = self.document.descendants("CdtTrfTxInf").len() as u32;
            let amounts: Vec<&str> = self
                .document
                .descendants("InstdAmt")
                .iter()
                .filter_map(|n| n.text())
                .collect();
            (count, amount::to_minor_units(&amount::sum_decimals(amounts)))
        };

        Summary {
            message_id: self.message_id.clone(),
            total_transactions,
            total_amount,
            batches,
        }
    }

    fn check_config(config: &MessageConfig) -> Result<()> {
        let required: [(&'static str, &str); 3] = [
            ("name", &config.name),
            ("IBAN", &config.iban),
            ("currency", &config.currency),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(Error::Config {
                    field,
                    reason: "is empty".to_string(),
                });
            }
        }

        let validators = Validators::new(config.validate);
        let mut checks: Vec<(PaymentField, &str)> = vec![
            (PaymentField::Name, &config.name),
            (PaymentField::Iban, &config.iban),
        ];
        if let Some(bic) = &config.bic {
            checks.push((PaymentField::Bic, bic));
        }
        for (field, value) in checks {
            validators
                .validate(field, value)
                .map_err(|reason| Error::Config {
                    field: field.as_str(),
                    reason,
                })?;
        }
        Ok(())
    }

    fn check_payment(&self, payment: &PaymentInstruction) -> Result<()> {
        let required: [(PaymentField, &str); 5] = [
            (PaymentField::Name, &payment.name),
            (PaymentField::Iban, &payment.iban),
            (PaymentField::Amount, &payment.amount),
            (PaymentField::ExecutionDate, &payment.execution_date),
            (PaymentField::Description, &payment.description),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(Error::Payment {
                    field: field.as_str(),
                    reason: "is empty".to_string(),
                });
            }
        }

        let validators = Validators::new(self.config.validate);
        let mut checks: Vec<(PaymentField, &str)> = required.into();
        if let Some(bic) = &payment.bic {
            checks.push((PaymentField::Bic, bic));
        }
        if let Some(id) = &payment.end_to_end_id {
            checks.push((PaymentField::EndToEndId, id));
        }
        for (field, value) in checks {
            validators
                .validate(field, value)
                .map_err(|reason| Error::Payment {
                    field: field.as_str(),
                    reason,
                })?;
        }
        Ok(())
    }

    fn document_skeleton(config: &MessageConfig, message_id: &str, created_at: &str) -> XmlNode {
        let mut root = XmlNode::new("Document");
        root.set_attr("xmlns", config.version.namespace());
        root.set_attr("xmlns:xsi", XSI_NAMESPACE);

        let mut header = XmlNode::new("GrpHdr");
        header.push(XmlNode::with_text("MsgId", message_id));
        header.push(XmlNode::with_text("CreDtTm", created_at));
        // Placeholders; filled from the tree scan at finalize.
        header.push(XmlNode::new("NbOfTxs"));
        header.push(XmlNode::new("CtrlSum"));

        let mut initiating_party = XmlNode::new("InitgPty");
        initiating_party.push(XmlNode::with_text("Nm", &config.name));
        if let Some(debitor_id) = &config.debitor_id {
            let mut other = XmlNode::new("Othr");
            other.push(XmlNode::with_text("Id", debitor_id));
            let mut org_id = XmlNode::new("OrgId");
            org_id.push(other);
            let mut id = XmlNode::new("Id");
            id.push(org_id);
            initiating_party.push(id);
        }
        header.push(initiating_party);

        let mut initiation = XmlNode::new("CstmrCdtTrfInitn");
        initiation.push(header);
        root.push(initiation);
        root
    }

    /// The `CdtTrfTxInf` entry for one payment.
    fn transaction_node(
        config: &MessageConfig,
        payment: &PaymentInstruction,
        end_to_end_id: &str,
    ) -> XmlNode {
        let mut transaction = XmlNode::new("CdtTrfTxInf");

        let mut payment_id = XmlNode::new("PmtId");
        payment_id.push(XmlNode::with_text("EndToEndId", end_to_end_id));
        transaction.push(payment_id);

        let mut instructed = XmlNode::with_text("InstdAmt", amount::to_decimal(&payment.amount));
        instructed.set_attr("Ccy", &config.currency);
        let mut amt = XmlNode::new("Amt");
        amt.push(instructed);
        transaction.push(amt);

        if let Some(bic) = &payment.bic {
            let mut institution = XmlNode::new("FinInstnId");
            institution.push(XmlNode::with_text("BIC", bic));
            let mut agent = XmlNode::new("CdtrAgt");
            agent.push(institution);
            transaction.push(agent);
        }

        let mut creditor = XmlNode::new("Cdtr");
        creditor.push(XmlNode::with_text("Nm", &payment.name));
        transaction.push(creditor);

        let mut account_id = XmlNode::new("Id");
        account_id.push(XmlNode::with_text("IBAN", &payment.iban));
        let mut account = XmlNode::new("CdtrAcct");
        account.push(account_id);
        transaction.push(account);

        let mut purpose = XmlNode::new("Purp");
        purpose.push(XmlNode::with_text("Cd", "SALA"));
        transaction.push(purpose);

        let mut remittance = XmlNode::new("RmtInf");
        remittance.push(XmlNode::with_text("Ustrd", &payment.description));
        transaction.push(remittance);

        transaction
    }

    /// The service level, local instrument, and category purpose shared by
    /// every payment-information block.
    fn payment_type_info() -> XmlNode {
        let mut type_info = XmlNode::new("PmtTpInf");

        let mut service_level = XmlNode::new("SvcLvl");
        service_level.push(XmlNode::with_text("Cd", "SEPA"));
        type_info.push(service_level);

        let mut local_instrument = XmlNode::new("LclInstrm");
        local_instrument.push(XmlNode::with_text("Cd", "CORE"));
        type_info.push(local_instrument);

        let mut category = XmlNode::new("CtgyPurp");
        category.push(XmlNode::with_text("Cd", "SALA"));
        type_info.push(category);

        type_info
    }

    /// Debtor identity, account, and agent from the config. Without a BIC
    /// the agent is reported as NOTPROVIDED.
    fn debtor_nodes(config: &MessageConfig) -> [XmlNode; 3] {
        let mut debtor = XmlNode::new("Dbtr");
        debtor.push(XmlNode::with_text("Nm", &config.name));

        let mut account_id = XmlNode::new("Id");
        account_id.push(XmlNode::with_text("IBAN", &config.iban));
        let mut account = XmlNode::new("DbtrAcct");
        account.push(account_id);

        let mut institution = XmlNode::new("FinInstnId");
        match &config.bic {
            Some(bic) => institution.push(XmlNode::with_text("BIC", bic)),
            None => {
                let mut other = XmlNode::new("Othr");
                other.push(XmlNode::with_text("Id", "NOTPROVIDED"));
                institution.push(other);
            }
        }
        let mut agent = XmlNode::new("DbtrAgt");
        agent.push(institution);

        [debtor, account, agent]
    }

    /// An empty batch-booked `PmtInf` block. Count and control sum stay
    /// placeholders until the batch is flushed at finalize.
    fn batch_block(config: &MessageConfig, execution_date: &str, batch_id: &str) -> XmlNode {
        let mut block = XmlNode::new("PmtInf");
        block.push(XmlNode::with_text("PmtInfId", batch_id));
        block.push(XmlNode::with_text("PmtMtd", "TRF"));
        block.push(XmlNode::with_text("BtchBookg", "true"));
        block.push(XmlNode::new("NbOfTxs"));
        block.push(XmlNode::new("CtrlSum"));
        block.push(Self::payment_type_info());
        block.push(XmlNode::with_text("ReqdExctnDt", execution_date));
        for node in Self::debtor_nodes(config) {
            block.push(node);
        }
        block.push(XmlNode::with_text("ChrgBr", "SLEV"));
        block
    }

    /// A complete single-payment `PmtInf` block for non-batch mode: not
    /// batch-booked, one transaction, control sum equal to that payment.
    fn single_payment_block(
        config: &MessageConfig,
        payment: &PaymentInstruction,
        block_id: &str,
        transaction: XmlNode,
    ) -> XmlNode {
        let mut block = XmlNode::new("PmtInf");
        block.push(XmlNode::with_text("PmtInfId", block_id));
        block.push(XmlNode::with_text("PmtMtd", "TRF"));
        block.push(XmlNode::with_text("BtchBookg", "false"));
        block.push(XmlNode::with_text("NbOfTxs", "1"));
        block.push(XmlNode::with_text(
            "CtrlSum",
            amount::to_decimal(&payment.amount),
        ));
        block.push(Self::payment_type_info());
        block.push(XmlNode::with_text("ReqdExctnDt", &payment.execution_date));
        for node in Self::debtor_nodes(config) {
            block.push(node);
        }
        block.push(XmlNode::with_text("ChrgBr", "SHAR"));
        block.push(transaction);
        block
    }

    fn initiation_mut(&mut self) -> Result<&mut XmlNode> {
        self.document
            .child_mut("CstmrCdtTrfInitn")
            .ok_or_else(|| Error::Location("CstmrCdtTrfInitn missing from document".to_string()))
    }

    fn header_mut(&mut self) -> Result<&mut XmlNode> {
        self.initiation_mut()?
            .child_mut("GrpHdr")
            .ok_or_else(|| Error::Location("GrpHdr missing from document".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> chrono::DateTime<chrono::Local> {
            chrono::Local
                .with_ymd_and_hms(2024, 1, 10, 9, 30, 0)
                .unwrap()
        }
    }

    struct CountingRandom(u64);

    impl RandomSource for CountingRandom {
        fn next_u64(&mut self) -> u64 {
            self.0 += 1;
            self.0
        }
    }

    fn test_config(batch: bool) -> MessageConfig {
        MessageConfig::new("Test", "NL91ABNA0417164300", "EUR", batch)
            .with_version(SchemaVersion::V3)
    }

    fn builder(batch: bool) -> SepaCreditTransfer {
        SepaCreditTransfer::with_sources(
            test_config(batch),
            &FixedClock,
            Box::new(CountingRandom(0)),
        )
        .unwrap()
    }

    fn payment(amount: &str) -> PaymentInstruction {
        PaymentInstruction {
            name: "Test von Testenstein".to_string(),
            iban: "GB82WEST12345698765432".to_string(),
            amount: amount.to_string(),
            execution_date: "2024-01-15".to_string(),
            description: "Test transaction".to_string(),
            sequence_type: Some(SequenceType::Rcur),
            ..Default::default()
        }
    }

    #[test]
    fn test_batched_two_payments_one_batch() {
        let mut message = builder(true);
        message.add_payment(&payment("1000")).unwrap();
        message.add_payment(&payment("2500")).unwrap();

        let summary = message.summary();
        assert_eq!(summary.batches.len(), 1);
        assert_eq!(summary.batches[0].transaction_count, 2);
        assert_eq!(summary.batches[0].amount, "3500");
        assert_eq!(summary.total_transactions, 2);
        assert_eq!(summary.total_amount, "3500");

        let xml = message.save().unwrap();
        assert!(xml.contains("<CtrlSum>35.00</CtrlSum>"));
        assert!(xml.contains("<NbOfTxs>2</NbOfTxs>"));
        assert!(xml.contains("<BtchBookg>true</BtchBookg>"));
        assert!(xml.contains("urn:iso:std:iso:20022:tech:xsd:pain.001.001.03"));
    }

    #[test]
    fn test_distinct_keys_open_distinct_batches() {
        let mut message = builder(true);
        message.add_payment(&payment("1000")).unwrap();

        let mut other_date = payment("2000");
        other_date.execution_date = "2024-02-01".to_string();
        message.add_payment(&other_date).unwrap();

        let mut other_type = payment("3000");
        other_type.sequence_type = Some(SequenceType::Frst);
        message.add_payment(&other_type).unwrap();

        let summary = message.summary();
        assert_eq!(summary.batches.len(), 3);
        assert_eq!(summary.total_transactions, 3);
        assert_eq!(summary.total_amount, "6000");
    }

    #[test]
    fn test_batch_totals_independent_of_insertion_order() {
        let mut message = builder(true);
        for a in ["300", "100", "200"] {
            message.add_payment(&payment(a)).unwrap();
        }
        let summary = message.summary();
        assert_eq!(summary.batches[0].transaction_count, 3);
        assert_eq!(summary.batches[0].amount, "600");
    }

    #[test]
    fn test_unbatched_single_payment() {
        let mut message = builder(false);
        message.add_payment(&payment("999")).unwrap();

        let summary = message.summary();
        assert_eq!(summary.total_transactions, 1);
        assert_eq!(summary.total_amount, "999");
        assert!(summary.batches.is_empty());

        let xml = message.save().unwrap();
        assert!(xml.contains("<CtrlSum>9.99</CtrlSum>"));
        assert!(xml.contains("<NbOfTxs>1</NbOfTxs>"));
        assert!(xml.contains("<BtchBookg>false</BtchBookg>"));
        assert!(xml.contains("<ChrgBr>SHAR</ChrgBr>"));
    }

    #[test]
    fn test_rejected_payment_leaves_state_untouched() {
        let mut message = builder(true);
        message.add_payment(&payment("1000")).unwrap();
        let before = message.summary();

        let mut bad = payment("2500");
        bad.description = "a".repeat(141);
        let err = message.add_payment(&bad).unwrap_err();
        assert!(matches!(
            err,
            Error::Payment {
                field: "description",
                ..
            }
        ));

        assert_eq!(message.summary(), before);
    }

    #[test]
    fn test_missing_required_payment_field() {
        let mut message = builder(true);
        let mut bad = payment("1000");
        bad.description = String::new();
        let err = message.add_payment(&bad).unwrap_err();
        assert_eq!(
            err,
            Error::Payment {
                field: "description",
                reason: "is empty".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_creditor_iban_rejected() {
        let mut message = builder(true);
        let mut bad = payment("1000");
        bad.iban = "GB82WEST12345698765431".to_string();
        let err = message.add_payment(&bad).unwrap_err();
        assert!(matches!(err, Error::Payment { field: "IBAN", .. }));
    }

    #[test]
    fn test_end_to_end_id_passthrough_and_generation() {
        let mut message = builder(true);

        let mut with_id = payment("1000");
        with_id.end_to_end_id = Some("INV-2024-0001".to_string());
        assert_eq!(message.add_payment(&with_id).unwrap(), "INV-2024-0001");

        let generated = message.add_payment(&payment("2000")).unwrap();
        assert!(generated.starts_with("Test-"));
        let suffix = generated.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 12);
        assert!(suffix.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_finalize_idempotency() {
        let mut message = builder(true);
        message.add_payment(&payment("1000")).unwrap();

        message.finalize().unwrap();
        let first = message.to_xml();
        assert!(matches!(message.finalize(), Err(Error::State(_))));
        assert_eq!(message.to_xml(), first);
    }

    #[test]
    fn test_add_payment_after_finalize_rejected() {
        let mut message = builder(true);
        message.add_payment(&payment("1000")).unwrap();
        message.finalize().unwrap();
        assert!(matches!(
            message.add_payment(&payment("2000")),
            Err(Error::State(_))
        ));
    }

    #[test]
    fn test_repeated_save_renders_same_document() {
        let mut message = builder(true);
        message.add_payment(&payment("1000")).unwrap();
        let first = message.save().unwrap();
        let second = message.save().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_config_requires_fields() {
        let err =
            SepaCreditTransfer::new(MessageConfig::new("", "NL91ABNA0417164300", "EUR", true))
                .unwrap_err();
        assert_eq!(
            err,
            Error::Config {
                field: "name",
                reason: "is empty".to_string()
            }
        );

        let err =
            SepaCreditTransfer::new(MessageConfig::new("Test", "NL91ABNA0417164301", "EUR", true))
                .unwrap_err();
        assert!(matches!(err, Error::Config { field: "IBAN", .. }));

        let err = SepaCreditTransfer::new(
            MessageConfig::new("Test", "NL91ABNA0417164300", "EUR", true).with_bic("NOPE"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config { field: "BIC", .. }));
    }

    #[test]
    fn test_validation_can_be_disabled() {
        let config = MessageConfig::new("Test", "NOT-AN-IBAN", "EUR", true).with_validation(false);
        assert!(SepaCreditTransfer::new(config).is_ok());
    }

    #[test]
    fn test_is_empty_tracks_batches() {
        let mut message = builder(true);
        assert!(message.is_empty());
        message.add_payment(&payment("1000")).unwrap();
        assert!(!message.is_empty());
    }

    #[test]
    fn test_message_id_uses_injected_sources() {
        let message = builder(true);
        // %d%m%Y%S%M of 2024-01-10 09:30:00.
        assert!(message.message_id().starts_with("100120240030-"));
        assert_eq!(message.summary().message_id, message.message_id());
    }

    #[test]
    fn test_debitor_id_appears_under_initiating_party() {
        let config = test_config(true).with_debitor_id("00000");
        let message =
            SepaCreditTransfer::with_sources(config, &FixedClock, Box::new(CountingRandom(0)))
                .unwrap();
        let xml = message.to_xml();
        assert!(xml.contains("<OrgId>"));
        assert!(xml.contains("<Id>00000</Id>"));
    }

    #[test]
    fn test_custom_node_attachment() {
        let mut message = builder(true);
        message
            .add_custom_node(
                "Document/CstmrCdtTrfInitn/GrpHdr",
                "Authstn",
                Some("TEST"),
                &[],
            )
            .unwrap();
        assert!(message.to_xml().contains("<Authstn>TEST</Authstn>"));
    }

    #[test]
    fn test_custom_node_location_errors() {
        let mut message = builder(false);
        let err = message
            .add_custom_node("Document/Nowhere", "X", None, &[])
            .unwrap_err();
        assert!(matches!(err, Error::Location(_)));

        message.add_payment(&payment("1000")).unwrap();
        message.add_payment(&payment("2000")).unwrap();
        let err = message
            .add_custom_node("Document/CstmrCdtTrfInitn/PmtInf", "X", None, &[])
            .unwrap_err();
        assert!(matches!(err, Error::Location(ref reason) if reason.contains("2 nodes")));
    }

    #[test]
    fn test_schema_version_selection() {
        let config = MessageConfig::new("Test", "NL91ABNA0417164300", "EUR", true);
        let message = SepaCreditTransfer::new(config).unwrap();
        assert_eq!(message.schema_version(), SchemaVersion::V2);
        assert_eq!(
            message.schema_version().schema_file(),
            "pain.001.001.02.xsd"
        );
        assert!(message
            .to_xml()
            .contains("urn:iso:std:iso:20022:tech:xsd:pain.001.001.02"));
    }

    #[test]
    fn test_summary_json_export() {
        let mut message = builder(true);
        message.add_payment(&payment("1000")).unwrap();
        let json = message.summary().to_json().unwrap();
        assert!(json.contains(message.message_id()));
        assert!(json.contains("\"RCUR\""));
    }
}
