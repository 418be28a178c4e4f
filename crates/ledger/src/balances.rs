use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::accounts::derive_token_account;
use crate::asset::{Asset, format_units};
use crate::error::LedgerResult;
use crate::provider::Ledger;

/// What the connected account holds, in smallest units per asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balances {
    pub sol: u64,
    pub usdc: u64,
    pub usdt: u64,
}

impl Balances {
    pub fn get(&self, asset: Asset) -> u64 {
        match asset {
            Asset::Sol => self.sol,
            Asset::Usdc => self.usdc,
            Asset::Usdt => self.usdt,
        }
    }

    /// Balance in whole units, e.g. `"2.5"`.
    pub fn whole(&self, asset: Asset) -> String {
        format_units(self.get(asset), asset.decimals())
    }
}

/// Read native and token balances for `owner`.
///
/// A failing native query is returned to the caller. A failing token query
/// (most often because the derived token account was never created) counts
/// as a zero balance.
pub async fn read_balances(ledger: &dyn Ledger, owner: &Pubkey) -> LedgerResult<Balances> {
    let sol = ledger.native_balance(owner).await?;
    let usdc = token_balance(ledger, owner, Asset::Usdc).await;
    let usdt = token_balance(ledger, owner, Asset::Usdt).await;

    tracing::debug!(owner = %owner, sol, usdc, usdt, "Balances refreshed");
    Ok(Balances { sol, usdc, usdt })
}

async fn token_balance(ledger: &dyn Ledger, owner: &Pubkey, asset: Asset) -> u64 {
    let Some(mint) = asset.mint() else {
        return 0;
    };
    let account = derive_token_account(owner, &mint);
    match ledger.token_account_balance(&account).await {
        Ok(units) => units,
        Err(e) => {
            tracing::debug!(
                asset = %asset,
                account = %account,
                error = %e,
                "Token balance unavailable, using zero"
            );
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::USDC_MINT;
    use crate::error::LedgerError;
    use crate::testing::FakeLedger;

    #[tokio::test]
    async fn missing_token_account_reads_as_zero() {
        let owner = Pubkey::new_unique();
        let ledger = FakeLedger::default();
        ledger.set_native(owner, 2_500_000_000);
        ledger.set_token(derive_token_account(&owner, &USDC_MINT), 12_340_000);

        let balances = read_balances(&ledger, &owner).await.unwrap();
        assert_eq!(
            balances,
            Balances {
                sol: 2_500_000_000,
                usdc: 12_340_000,
                usdt: 0,
            }
        );
        assert_eq!(balances.whole(Asset::Sol), "2.5");
        assert_eq!(balances.whole(Asset::Usdc), "12.34");
    }

    #[tokio::test]
    async fn native_query_failure_is_propagated() {
        let owner = Pubkey::new_unique();
        let ledger = FakeLedger::default();
        ledger.fail_native("connection refused");

        let err = read_balances(&ledger, &owner).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rpc(msg) if msg == "connection refused"));
    }
}
