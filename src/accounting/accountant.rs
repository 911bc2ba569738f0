use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;

use crate::accounting::reports::Report;
use crate::accounting::{calculate_capital_gains, AccountingMethod, Progress, ProgressSender};
use crate::chain;
use crate::parser::RawTransaction;
use crate::prices::PriceInformation;
use crate::source::TransactionSource;
use crate::swaps::{BaseTransfer, Reconstruction, Reconstructor, SwapEvent};
use crate::tax::TaxRegion;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum Analysis {
    /// The history held no swaps.
    Empty,
    Complete(Report),
}

#[derive(Default)]
struct Collected {
    swaps: Vec<SwapEvent>,
    deposits: Vec<BaseTransfer>,
    withdrawals: Vec<BaseTransfer>,
    known_protocol: usize,
    skipped: usize,
}

pub struct Accountant<'a> {
    price_information: &'a mut PriceInformation,
    reconstructor: Reconstructor,
    accounting_method: AccountingMethod,
    tax_region: TaxRegion,
    max_transactions: usize,
    progress: ProgressSender,
}

impl<'a> Accountant<'a> {
    pub fn new(price_information: &'a mut PriceInformation, reconstructor: Reconstructor) -> Accountant<'a> {
        Accountant {
            price_information,
            reconstructor,
            accounting_method: AccountingMethod::FIFO,
            tax_region: TaxRegion::UsFederal,
            max_transactions: 1000,
            progress: ProgressSender::none(),
        }
    }

    pub fn method(&mut self, method: AccountingMethod) -> &mut Self {
        self.accounting_method = method;
        self
    }

    pub fn region(&mut self, region: TaxRegion) -> &mut Self {
        self.tax_region = region;
        self
    }

    pub fn max_transactions(&mut self, max_transactions: usize) -> &mut Self {
        self.max_transactions = max_transactions;
        self
    }

    pub fn progress(&mut self, sender: UnboundedSender<Progress>) -> &mut Self {
        self.progress = ProgressSender::new(sender);
        self
    }

    /// Fetches and reconstructs the wallet history, then runs the ledger
    /// over the swaps in chronological order.
    pub async fn analyze<S: TransactionSource>(&mut self, source: S) -> Analysis {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let (fetched, collected) = tokio::join!(
            produce(source, sender, self.max_transactions, &self.progress),
            consume(receiver, &self.reconstructor, &self.progress),
        );
        info!(
            "Fetched {} transactions: {} swaps ({} known protocol), {} deposits, {} withdrawals, {} skipped",
            fetched,
            collected.swaps.len(),
            collected.known_protocol,
            collected.deposits.len(),
            collected.withdrawals.len(),
            collected.skipped
        );

        let Collected {
            mut swaps,
            deposits,
            withdrawals,
            ..
        } = collected;
        if swaps.is_empty() {
            info!("No swaps found for {}", self.reconstructor.wallet());
            return Analysis::Empty;
        }
        swaps.sort_by(|a, b| a.date.cmp(&b.date));

        let mints: Vec<String> = swaps
            .iter()
            .flat_map(|swap| [swap.sold.mint.clone(), swap.bought.mint.clone()])
            .collect();
        self.price_information.resolve_metadata(mints).await;

        let dates: Vec<_> = swaps
            .iter()
            .filter(|swap| chain::is_base_mint(&swap.sold.mint) || chain::is_base_mint(&swap.bought.mint))
            .map(|swap| swap.date.date_naive())
            .collect();
        self.price_information.resolve_base_prices(dates).await;

        let calculation = calculate_capital_gains(
            &swaps,
            &mut *self.price_information,
            self.accounting_method,
            self.tax_region,
            self.progress.clone(),
        );
        Analysis::Complete(Report::new(
            self.reconstructor.wallet(),
            self.accounting_method,
            self.tax_region,
            &calculation,
            &deposits,
            &withdrawals,
        ))
    }
}

async fn produce<S: TransactionSource>(
    mut source: S,
    sender: mpsc::Sender<Value>,
    max_transactions: usize,
    progress: &ProgressSender,
) -> usize {
    let mut fetched = 0;
    let mut page_number = 0;

    while fetched < max_transactions {
        let page = match source.next_page().await {
            Ok(Some(page)) => page,
            Ok(None) => break,
            Err(e) => {
                warn!("Stopped fetching after {} transactions: {}", fetched, e);
                break;
            }
        };
        page_number += 1;
        let on_page = page.len();
        let take = on_page.min(max_transactions - fetched);
        fetched += take;
        info!("Fetched page {} ({} transactions, {} total)", page_number, on_page, fetched);
        progress.emit(Progress::FetchProgress {
            page: page_number,
            transactions_on_page: on_page,
            total_transactions: fetched,
        });

        for record in page.into_iter().take(take) {
            if sender.send(record).await.is_err() {
                return fetched;
            }
        }
    }
    fetched
}

async fn consume(
    mut receiver: mpsc::Receiver<Value>,
    reconstructor: &Reconstructor,
    progress: &ProgressSender,
) -> Collected {
    let mut collected = Collected::default();

    while let Some(record) = receiver.recv().await {
        let transaction = match RawTransaction::parse(record, reconstructor.wallet()) {
            Ok(transaction) => transaction,
            Err(e) => {
                debug!("Skipping record: {}", e);
                collected.skipped += 1;
                continue;
            }
        };

        match reconstructor.reconstruct(&transaction) {
            Reconstruction::Swaps(swaps) => {
                collected.known_protocol += swaps.iter().filter(|swap| swap.known_protocol).count();
                collected.swaps.extend(swaps);
                progress.emit(Progress::ParseProgress {
                    parsed_swaps: collected.swaps.len(),
                    known_protocol: collected.known_protocol,
                });
            }
            Reconstruction::Deposit(deposit) => collected.deposits.push(deposit),
            Reconstruction::Withdrawal(withdrawal) => collected.withdrawals.push(withdrawal),
            Reconstruction::Ignored => {}
        }
    }
    collected
}
