use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use crate::domain::{
    Account, AccountIntegrity, Cents, ConsumptionEntry, ConsumptionId, ConsumptionRecord,
    ConsumptionUpdate, CustomerId, IntegrityReport, LedgerTransaction, NewCustomer, PricingPolicy,
    Statement, TransactionId,
};
use crate::storage::{Repository, accounts};

use super::AppError;
use super::consumption::{ConsumptionRecorder, DailyEntry, RecordOutcome};
use super::ledger::LedgerStore;
use super::recharge::RechargeProcessor;
use super::statement::StatementBuilder;

/// Knobs the service is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    pub pricing: PricingPolicy,
    /// Confirm recharges as soon as they are recorded
    pub auto_confirm_recharges: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            auto_confirm_recharges: true,
        }
    }
}

/// Account details for display.
pub struct AccountInfo {
    pub account: Account,
    pub record_count: i64,
    pub pending_count: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Application service wiring the ledger components to one database.
/// This is the primary interface for any client (CLI, HTTP handler, tests).
#[derive(Clone)]
pub struct WalletService {
    repo: Repository,
    ledger: LedgerStore,
    recorder: ConsumptionRecorder,
    recharges: RechargeProcessor,
    statements: StatementBuilder,
}

impl WalletService {
    /// Build the components around an already migrated repository.
    pub fn new(repo: Repository, options: ServiceOptions) -> Self {
        let ledger = LedgerStore::new(repo.clone());
        Self {
            recorder: ConsumptionRecorder::new(repo.clone(), options.pricing),
            recharges: RechargeProcessor::new(ledger.clone(), options.auto_confirm_recharges),
            statements: StatementBuilder::new(repo.clone()),
            ledger,
            repo,
        }
    }

    /// Open (creating and migrating if needed) the database at `path`.
    pub async fn open(path: impl AsRef<Path>, options: ServiceOptions) -> Result<Self, AppError> {
        options.pricing.validate()?;
        let repo = Repository::init(path).await?;
        Ok(Self::new(repo, options))
    }

    pub async fn close(&self) {
        self.repo.close().await;
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub fn recorder(&self) -> &ConsumptionRecorder {
        &self.recorder
    }

    pub fn recharges(&self) -> &RechargeProcessor {
        &self.recharges
    }

    pub fn statements(&self) -> &StatementBuilder {
        &self.statements
    }

    pub fn pricing(&self) -> &PricingPolicy {
        self.recorder.pricing()
    }

    // ========================
    // Account operations
    // ========================

    /// Open a wallet for a new customer with a zero balance.
    pub async fn open_account(&self, customer: NewCustomer) -> Result<Account, AppError> {
        let account = Account::open(customer, Utc::now());
        let mut conn = self.repo.acquire().await?;
        accounts::insert(&mut conn, &account).await?;

        info!(customer_id = %account.id, name = %account.name, "account opened");
        Ok(account)
    }

    pub async fn get_account(&self, customer_id: CustomerId) -> Result<Account, AppError> {
        let mut conn = self.repo.acquire().await?;
        accounts::find(&mut conn, customer_id)
            .await?
            .ok_or(AppError::AccountNotFound(customer_id))
    }

    pub async fn get_account_info(&self, customer_id: CustomerId) -> Result<AccountInfo, AppError> {
        let account = self.get_account(customer_id).await?;
        let record_count = self.recorder.count_for_customer(customer_id).await?;
        let history = self.ledger.list_transactions(customer_id).await?;

        Ok(AccountInfo {
            account,
            record_count,
            pending_count: history.iter().filter(|t| !t.is_confirmed()).count(),
            last_activity: history.iter().map(|t| t.created_at).max(),
        })
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(accounts::list(&mut conn).await?)
    }

    // ========================
    // Consumption operations
    // ========================

    pub async fn record_consumption(&self, entry: ConsumptionEntry) -> Result<RecordOutcome, AppError> {
        self.recorder.create(entry, Utc::now()).await
    }

    pub async fn update_consumption(
        &self,
        id: ConsumptionId,
        update: ConsumptionUpdate,
    ) -> Result<RecordOutcome, AppError> {
        self.recorder.update(id, update, Utc::now()).await
    }

    pub async fn delete_consumption(&self, id: ConsumptionId) -> Result<RecordOutcome, AppError> {
        self.recorder.delete(id, Utc::now()).await
    }

    pub async fn get_consumption(&self, id: ConsumptionId) -> Result<ConsumptionRecord, AppError> {
        self.recorder.get(id).await
    }

    pub async fn list_consumption_for_date(
        &self,
        date: NaiveDate,
        customer_id: Option<CustomerId>,
    ) -> Result<Vec<DailyEntry>, AppError> {
        self.recorder.list_for_date(date, customer_id).await
    }

    // ========================
    // Recharge and ledger operations
    // ========================

    pub async fn recharge(
        &self,
        customer_id: CustomerId,
        amount: Cents,
        reference: Option<String>,
    ) -> Result<LedgerTransaction, AppError> {
        self.recharges
            .recharge(customer_id, amount, reference, Utc::now())
            .await
    }

    pub async fn confirm(&self, id: TransactionId) -> Result<LedgerTransaction, AppError> {
        self.recharges.confirm(id).await
    }

    pub async fn list_pending(
        &self,
        customer_id: Option<CustomerId>,
    ) -> Result<Vec<LedgerTransaction>, AppError> {
        self.ledger.list_pending(customer_id).await
    }

    pub async fn list_transactions(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<LedgerTransaction>, AppError> {
        self.ledger.list_transactions(customer_id).await
    }

    pub async fn balance_as_of(
        &self,
        customer_id: CustomerId,
        cutoff: DateTime<Utc>,
    ) -> Result<Cents, AppError> {
        self.ledger.balance_as_of(customer_id, cutoff).await
    }

    // ========================
    // Statements and integrity
    // ========================

    pub async fn build_statement(
        &self,
        customer_id: CustomerId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Statement, AppError> {
        self.statements.build(customer_id, start, end).await
    }

    pub async fn verify_account(&self, customer_id: CustomerId) -> Result<AccountIntegrity, AppError> {
        self.ledger.verify_account(customer_id).await
    }

    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        self.ledger.check_integrity().await
    }
}
