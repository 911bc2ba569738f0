mod inventory;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;

use crate::accounting::{AccountingMethod, Progress, ProgressSender, TaxableEvent, TokenStats};
use crate::chain::{self, FLOAT_EPSILON};
use crate::prices::{PriceInformation, TokenMetadata};
use crate::swaps::SwapEvent;
use crate::tax::{TaxRegion, Term};

use inventory::{Consumption, Inventory};

/// Open position left in the ledger after all swaps are applied.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Holding {
    pub symbol: String,
    pub amount: f64,
    pub cost_basis: f64,
}

/// Folds chronologically ordered swaps into the ledger and returns it.
pub fn calculate_capital_gains<'a>(
    swaps: &[SwapEvent],
    price_information: &'a mut PriceInformation,
    accounting_method: AccountingMethod,
    tax_region: TaxRegion,
    progress: ProgressSender,
) -> CapitalGainsCalculation<'a> {
    let mut calculation = CapitalGainsCalculation::new(price_information, accounting_method, tax_region);
    calculation.progress = progress;

    for (i, swap) in swaps.iter().enumerate() {
        calculation.process_swap(swap);
        if (i + 1) % 50 == 0 {
            debug!("Processed {}/{} swaps", i + 1, swaps.len());
            calculation.progress.emit(Progress::Processed {
                processed: i + 1,
                total: swaps.len(),
            });
        }
    }

    info!(
        "Applied {} swaps: {} taxable sales across {} tokens",
        swaps.len(),
        calculation.log.len(),
        calculation.stats.len()
    );
    calculation
}

pub struct CapitalGainsCalculation<'a> {
    price_information: &'a mut PriceInformation,
    accounting_method: AccountingMethod,
    tax_region: TaxRegion,
    assets: HashMap<String, Inventory>,
    stats: HashMap<String, TokenStats>,
    log: Vec<TaxableEvent>,
    base_spent: f64,
    base_received: f64,
    progress: ProgressSender,
}

impl<'a> CapitalGainsCalculation<'a> {
    pub fn new(
        price_information: &'a mut PriceInformation,
        accounting_method: AccountingMethod,
        tax_region: TaxRegion,
    ) -> CapitalGainsCalculation<'a> {
        CapitalGainsCalculation {
            price_information,
            accounting_method,
            tax_region,
            assets: HashMap::new(),
            stats: HashMap::new(),
            log: Vec::new(),
            base_spent: 0.0,
            base_received: 0.0,
            progress: ProgressSender::none(),
        }
    }

    pub fn events(&self) -> &[TaxableEvent] {
        &self.log
    }

    pub fn stats(&self) -> &HashMap<String, TokenStats> {
        &self.stats
    }

    pub fn token_metadata(&self, mint: &str) -> Option<&TokenMetadata> {
        self.price_information.lookup(mint)
    }

    pub fn base_spent(&self) -> f64 {
        self.base_spent
    }

    pub fn base_received(&self) -> f64 {
        self.base_received
    }

    pub fn holdings(&self) -> Vec<Holding> {
        let mut holdings: Vec<Holding> = self
            .assets
            .iter()
            .map(|(symbol, inventory)| Holding {
                symbol: symbol.clone(),
                amount: inventory.remaining(),
                cost_basis: inventory.remaining_cost(),
            })
            .filter(|holding| holding.amount > 0.001)
            .collect();
        holdings.sort_by(|a, b| b.cost_basis.total_cmp(&a.cost_basis).then_with(|| a.symbol.cmp(&b.symbol)));
        holdings
    }

    pub fn process_swap(&mut self, swap: &SwapEvent) {
        let sold_is_base = chain::is_base_mint(&swap.sold.mint);
        let bought_is_base = chain::is_base_mint(&swap.bought.mint);

        let sold_symbol = self.symbol_of(&swap.sold.mint, swap.sold.symbol.as_deref());
        let bought_symbol = self.symbol_of(&swap.bought.mint, swap.bought.symbol.as_deref());

        // a SOL leg anchors the value; token-for-token swaps carry their
        // basis across at the sold token's average cost
        let value = if sold_is_base {
            swap.sold.amount * self.price_information.base_price(swap.date.date_naive())
        } else if bought_is_base {
            swap.bought.amount * self.price_information.base_price(swap.date.date_naive())
        } else {
            self.cost_basis_estimate(&sold_symbol, swap.sold.amount)
        };

        if sold_is_base {
            self.base_spent += swap.sold.amount;
        } else {
            self.process_sale(swap.date, &sold_symbol, &swap.sold.mint, swap.sold.amount, value);
        }

        if bought_is_base {
            self.base_received += swap.bought.amount;
        } else {
            self.process_purchase(swap.date, &bought_symbol, swap.bought.amount, value);
        }
    }

    /// Acquired cost of the open lots over the amount still held, applied to
    /// `amount`.
    pub fn cost_basis_estimate(&self, token: &str, amount: f64) -> f64 {
        match self.assets.get(token) {
            Some(inventory) => {
                let remaining = inventory.remaining();
                if remaining > FLOAT_EPSILON {
                    inventory.acquired_cost() / remaining * amount
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    pub fn process_purchase(&mut self, date: DateTime<Utc>, token: &str, amount: f64, cost: f64) {
        if amount <= FLOAT_EPSILON {
            return;
        }

        let accounting_method = self.accounting_method;
        self.assets
            .entry(token.to_string())
            .or_insert_with(|| Inventory::new(accounting_method))
            .deposit(date, amount, cost);

        let stats = self.stats.entry(token.to_string()).or_default();
        stats.total_bought += amount;
        stats.total_cost += cost;
        stats.total_trades += 1;
        if stats.first_purchase_date.map_or(true, |first| date < first) {
            stats.first_purchase_date = Some(date);
        }
    }

    /// Records a disposal and returns the realized gain.
    pub fn process_sale(
        &mut self,
        date: DateTime<Utc>,
        token: &str,
        token_mint: &str,
        amount: f64,
        proceeds: f64,
    ) -> f64 {
        if amount <= FLOAT_EPSILON {
            return 0.0;
        }

        // no open lots: previously untracked inventory sold at zero cost
        let consumption = match self.assets.get_mut(token) {
            Some(inventory) if !inventory.is_empty() => inventory.withdraw(date, amount),
            _ => Consumption {
                uncovered: amount,
                ..Consumption::default()
            },
        };
        if consumption.uncovered > FLOAT_EPSILON {
            debug!(
                "Sold {:.6} {} beyond tracked lots; uncovered part has zero cost basis",
                consumption.uncovered, token
            );
        }

        let holding_days = consumption.holding_days();
        let gain = proceeds - consumption.cost_basis;
        let region = self.tax_region.config();
        let assessment = region.assess(gain, holding_days);
        let token_name = self.price_information.metadata(token_mint).name.clone();

        let stats = self.stats.entry(token.to_string()).or_default();
        stats.total_sold += amount;
        stats.total_proceeds += proceeds;
        stats.total_trades += 1;
        if stats.last_sale_date.map_or(true, |last| date > last) {
            stats.last_sale_date = Some(date);
        }
        if assessment.term == Term::ShortTerm {
            stats.short_term_gains += gain;
        } else {
            stats.long_term_gains += gain;
        }

        let event = TaxableEvent {
            date,
            token: token.to_string(),
            token_name,
            token_mint: token_mint.to_string(),
            amount,
            proceeds,
            cost_basis: consumption.cost_basis,
            capital_gain: gain,
            holding_days,
            term_type: assessment.term,
            tax_liability: assessment.liability,
        };
        self.progress.emit(Progress::Disposal {
            event: event.clone(),
            stats: stats.clone(),
        });
        self.log.push(event);

        gain
    }

    fn symbol_of(&mut self, mint: &str, known: Option<&str>) -> String {
        match known {
            Some(symbol) => symbol.to_string(),
            None => self.price_information.metadata(mint).symbol.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swaps::{SwapKind, SwapLeg};
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap() + Duration::days(n)
    }

    fn resolver() -> PriceInformation {
        let mut prices = PriceInformation::offline();
        prices.default_base_price(1.0);
        prices.insert_metadata(TokenMetadata::new("MintA", "AAA", "Token A"));
        prices.insert_metadata(TokenMetadata::new("MintB", "BBB", "Token B"));
        prices
    }

    fn swap(date: DateTime<Utc>, kind: SwapKind, sold: (&str, f64), bought: (&str, f64)) -> SwapEvent {
        let leg = |(mint, amount): (&str, f64)| SwapLeg {
            mint: mint.to_string(),
            amount,
            symbol: if chain::is_base_mint(mint) { Some("SOL".to_string()) } else { None },
        };
        SwapEvent {
            date,
            kind,
            sold: leg(sold),
            bought: leg(bought),
            signature: String::new(),
            base_change: 0.0,
            known_protocol: false,
        }
    }

    #[test]
    fn fifo_and_lifo_diverge() {
        for (method, cost, gain) in [(AccountingMethod::FIFO, 10.0, 40.0), (AccountingMethod::LIFO, 30.0, 20.0)] {
            let mut prices = resolver();
            let mut calc = CapitalGainsCalculation::new(&mut prices, method, TaxRegion::UsFederal);
            calc.process_purchase(day(0), "AAA", 10.0, 10.0);
            calc.process_purchase(day(1), "AAA", 10.0, 30.0);
            let realized = calc.process_sale(day(2), "AAA", "MintA", 10.0, 50.0);

            assert!((realized - gain).abs() < 1e-9, "{:?}", method);
            let event = &calc.events()[0];
            assert!((event.cost_basis - cost).abs() < 1e-9, "{:?}", method);
            assert!((event.capital_gain - gain).abs() < 1e-9, "{:?}", method);
        }
    }

    #[test]
    fn weighted_holding_period_is_single_number() {
        let mut prices = resolver();
        let mut calc = CapitalGainsCalculation::new(&mut prices, AccountingMethod::FIFO, TaxRegion::UsFederal);
        calc.process_purchase(day(0), "AAA", 5.0, 5.0);
        calc.process_purchase(day(100), "AAA", 5.0, 5.0);
        calc.process_sale(day(100), "AAA", "MintA", 10.0, 20.0);

        assert_eq!(calc.events().len(), 1);
        assert_eq!(calc.events()[0].holding_days, 50);
    }

    #[test]
    fn holding_period_truncates_to_whole_days() {
        let mut prices = resolver();
        let mut calc = CapitalGainsCalculation::new(&mut prices, AccountingMethod::FIFO, TaxRegion::UsFederal);
        calc.process_purchase(day(0), "AAA", 1.0, 1.0);
        calc.process_purchase(day(10), "AAA", 2.0, 1.0);
        // (1 * 10 + 2 * 0) / 3 = 3.33
        calc.process_sale(day(10), "AAA", "MintA", 3.0, 5.0);
        assert_eq!(calc.events()[0].holding_days, 3);
    }

    #[test]
    fn same_day_lots_sold_after_a_year_are_long_term() {
        let mut prices = resolver();
        let mut calc = CapitalGainsCalculation::new(&mut prices, AccountingMethod::FIFO, TaxRegion::UsFederal);
        let amounts = [98.14372, 10.12958, 96.23417, 13.24681, 1.81093];
        for amount in amounts.iter() {
            calc.process_purchase(day(0), "AAA", *amount, 1.0);
        }
        let total: f64 = amounts.iter().sum();
        calc.process_sale(day(365), "AAA", "MintA", total, 100.0);

        let event = &calc.events()[0];
        assert_eq!(event.holding_days, 365);
        assert_eq!(event.term_type, Term::LongTerm);
        assert!((calc.stats()["AAA"].long_term_gains - 95.0).abs() < 1e-9);
        assert_eq!(calc.stats()["AAA"].short_term_gains, 0.0);
    }

    #[test]
    fn losses_are_kept_out_of_short_term_gains() {
        let mut prices = resolver();
        let mut calc = CapitalGainsCalculation::new(&mut prices, AccountingMethod::FIFO, TaxRegion::UsFederal);
        calc.process_purchase(day(0), "AAA", 10.0, 40.0);
        calc.process_sale(day(3), "AAA", "MintA", 10.0, 10.0);

        let event = &calc.events()[0];
        assert_eq!(event.holding_days, 3);
        assert_eq!(event.term_type, Term::NotApplicable);
        let stats = &calc.stats()["AAA"];
        assert_eq!(stats.short_term_gains, 0.0);
        assert!((stats.long_term_gains + 30.0).abs() < 1e-9);
    }

    #[test]
    fn estimate_uses_acquired_cost_after_partial_sale() {
        let mut prices = resolver();
        let mut calc = CapitalGainsCalculation::new(&mut prices, AccountingMethod::FIFO, TaxRegion::UsFederal);
        calc.process_purchase(day(0), "AAA", 100.0, 200.0);
        calc.process_purchase(day(1), "AAA", 100.0, 600.0);
        calc.process_sale(day(2), "AAA", "MintA", 50.0, 100.0);

        // (200 + 600) / 150 * 50
        let estimate = calc.cost_basis_estimate("AAA", 50.0);
        assert!((estimate - 800.0 / 3.0).abs() < 1e-9);
        assert_eq!(calc.cost_basis_estimate("BBB", 50.0), 0.0);
    }

    #[test]
    fn selling_untracked_token_has_zero_cost() {
        let mut prices = resolver();
        let mut calc = CapitalGainsCalculation::new(&mut prices, AccountingMethod::FIFO, TaxRegion::UsFederal);
        let gain = calc.process_sale(day(0), "AAA", "MintA", 100.0, 12.5);

        assert_eq!(gain, 12.5);
        let event = &calc.events()[0];
        assert_eq!(event.cost_basis, 0.0);
        assert_eq!(event.capital_gain, event.proceeds);
        assert_eq!(event.holding_days, 0);
        assert_eq!(event.term_type, Term::ShortTerm);
        assert_eq!(event.token_name, "Token A");
    }

    #[test]
    fn lots_are_conserved() {
        let mut prices = resolver();
        let mut calc = CapitalGainsCalculation::new(&mut prices, AccountingMethod::LIFO, TaxRegion::UsFederal);
        let buys = [3.5, 10.0, 0.25, 7.0];
        let sells = [4.0, 0.3, 9.1];
        for (i, amount) in buys.iter().enumerate() {
            calc.process_purchase(day(i as i64), "AAA", *amount, amount * 2.0);
        }
        for (i, amount) in sells.iter().enumerate() {
            calc.process_sale(day(10 + i as i64), "AAA", "MintA", *amount, 1.0);
        }

        let acquired: f64 = buys.iter().sum();
        let disposed: f64 = sells.iter().sum();
        let remaining = calc.assets["AAA"].remaining();
        assert!((remaining - (acquired - disposed)).abs() < FLOAT_EPSILON);
    }

    #[test]
    fn dust_is_ignored() {
        let mut prices = resolver();
        let mut calc = CapitalGainsCalculation::new(&mut prices, AccountingMethod::FIFO, TaxRegion::UsFederal);
        calc.process_purchase(day(0), "AAA", 0.00001, 5.0);
        assert_eq!(calc.process_sale(day(1), "AAA", "MintA", 0.0001, 5.0), 0.0);
        assert!(calc.stats().is_empty());
        assert!(calc.events().is_empty());
    }

    #[test]
    fn stats_track_both_sides() {
        let mut prices = resolver();
        let mut calc = CapitalGainsCalculation::new(&mut prices, AccountingMethod::FIFO, TaxRegion::UsFederal);
        calc.process_purchase(day(5), "AAA", 10.0, 4.0);
        calc.process_purchase(day(2), "AAA", 10.0, 6.0);
        calc.process_sale(day(400), "AAA", "MintA", 20.0, 30.0);
        calc.process_sale(day(401), "AAA", "MintA", 1.0, 1.0);

        let stats = &calc.stats()["AAA"];
        assert_eq!(stats.total_bought, 20.0);
        assert_eq!(stats.total_cost, 10.0);
        assert_eq!(stats.total_sold, 21.0);
        assert_eq!(stats.total_proceeds, 31.0);
        assert_eq!(stats.total_trades, 4);
        assert_eq!(stats.first_purchase_date, Some(day(2)));
        assert_eq!(stats.last_sale_date, Some(day(401)));
        assert!((stats.long_term_gains - 20.0).abs() < 1e-9);
        assert!((stats.short_term_gains - 1.0).abs() < 1e-9);
    }

    #[test]
    fn swaps_value_legs() {
        let mut prices = resolver();
        let mut calc = CapitalGainsCalculation::new(&mut prices, AccountingMethod::FIFO, TaxRegion::UsFederal);
        calc.process_swap(&swap(day(0), SwapKind::Buy, (chain::SOL_MINT, 2.0), ("MintA", 100.0)));
        calc.process_swap(&swap(day(1), SwapKind::Buy, (chain::SOL_MINT, 6.0), ("MintA", 100.0)));
        // 50 AAA at the 0.04 average cost carried into 10 BBB
        calc.process_swap(&swap(day(2), SwapKind::Swap, ("MintA", 50.0), ("MintB", 10.0)));
        calc.process_swap(&swap(day(3), SwapKind::Sell, ("MintB", 10.0), (chain::SOL_MINT, 5.0)));

        assert_eq!(calc.base_spent(), 8.0);
        assert_eq!(calc.base_received(), 5.0);

        let events = calc.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].token, "AAA");
        assert!((events[0].proceeds - 2.0).abs() < 1e-9);
        assert!((events[0].cost_basis - 1.0).abs() < 1e-9);
        assert_eq!(events[1].token, "BBB");
        assert!((events[1].cost_basis - 2.0).abs() < 1e-9);
        assert!((events[1].capital_gain - 3.0).abs() < 1e-9);

        let holdings = calc.holdings();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].symbol, "AAA");
        assert!((holdings[0].amount - 150.0).abs() < 1e-9);
    }

    #[test]
    fn disposals_are_streamed() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut prices = resolver();
        let swaps = vec![
            swap(day(0), SwapKind::Buy, (chain::SOL_MINT, 1.0), ("MintA", 10.0)),
            swap(day(1), SwapKind::Sell, ("MintA", 10.0), (chain::SOL_MINT, 3.0)),
        ];
        let calc = calculate_capital_gains(
            &swaps,
            &mut prices,
            AccountingMethod::FIFO,
            TaxRegion::UsFederal,
            ProgressSender::new(tx),
        );
        assert_eq!(calc.events().len(), 1);

        match rx.try_recv().unwrap() {
            Progress::Disposal { event, stats } => {
                assert_eq!(event.token, "AAA");
                assert!((event.capital_gain - 2.0).abs() < 1e-9);
                assert_eq!(stats.total_trades, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}
