use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;

use crate::accounts::derive_token_account;
use crate::asset::Asset;
use crate::error::{LedgerResult, WalletError};
use crate::provider::Ledger;

/// An unsigned transfer ready for the external signer.
///
/// Carries a blockhash fetched at build time, so it must be handed to the
/// signer promptly.
#[derive(Debug, Clone)]
pub struct UnsignedTransfer {
    pub asset: Asset,
    pub sender: Pubkey,
    pub recipient: Pubkey,
    /// Amount in smallest units of `asset`.
    pub units: u64,
    pub transaction: Transaction,
}

impl UnsignedTransfer {
    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.transaction.message.account_keys.first()
    }
}

/// The single instruction moving `units` of `asset` from `sender` to `recipient`.
///
/// Token transfers go between the two derived token accounts. Whether the
/// recipient's account exists is not checked here; the ledger rejects the
/// transfer if it does not.
pub fn transfer_instruction(
    asset: Asset,
    sender: &Pubkey,
    recipient: &Pubkey,
    units: u64,
) -> Result<Instruction, WalletError> {
    match asset.mint() {
        None => Ok(system_instruction::transfer(sender, recipient, units)),
        Some(mint) => {
            let source = derive_token_account(sender, &mint);
            let destination = derive_token_account(recipient, &mint);
            spl_token::instruction::transfer(
                &spl_token::id(),
                &source,
                &destination,
                sender,
                &[],
                units,
            )
            .map_err(|e| WalletError::Build(e.to_string()))
        }
    }
}

/// Build the unsigned transfer with `sender` as fee payer and a fresh blockhash.
pub async fn build_transfer(
    ledger: &dyn Ledger,
    asset: Asset,
    sender: &Pubkey,
    recipient: &Pubkey,
    units: u64,
) -> Result<UnsignedTransfer, WalletError> {
    let instruction = transfer_instruction(asset, sender, recipient, units)?;
    let blockhash = ledger.latest_blockhash().await?;
    let message = Message::new_with_blockhash(&[instruction], Some(sender), &blockhash);

    Ok(UnsignedTransfer {
        asset,
        sender: *sender,
        recipient: *recipient,
        units,
        transaction: Transaction::new_unsigned(message),
    })
}

/// Network fee the ledger would charge for `transfer`.
pub async fn estimate_fee(ledger: &dyn Ledger, transfer: &UnsignedTransfer) -> LedgerResult<u64> {
    ledger.fee_for_message(&transfer.transaction.message).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{USDC_MINT, USDT_MINT, parse_units};
    use crate::testing::FakeLedger;
    use solana_sdk::hash::Hash;
    use solana_sdk::system_instruction::SystemInstruction;
    use solana_sdk::system_program;
    use spl_token::instruction::TokenInstruction;

    #[tokio::test]
    async fn native_transfer_moves_exact_units_with_sender_paying() {
        let ledger = FakeLedger::default();
        let blockhash = Hash::new_unique();
        ledger.set_blockhash(blockhash);
        let sender = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();

        for amount in ["0.000000001", "1", "2.5", "17.123456789"] {
            let units = parse_units(amount, Asset::Sol.decimals()).unwrap();
            let transfer = build_transfer(&ledger, Asset::Sol, &sender, &recipient, units)
                .await
                .unwrap();

            let message = &transfer.transaction.message;
            assert_eq!(transfer.fee_payer(), Some(&sender));
            assert_eq!(message.recent_blockhash, blockhash);
            assert_eq!(message.instructions.len(), 1);

            let ix = &message.instructions[0];
            assert_eq!(message.account_keys[ix.program_id_index as usize], system_program::id());
            let accounts: Vec<_> = ix
                .accounts
                .iter()
                .map(|&i| message.account_keys[i as usize])
                .collect();
            assert_eq!(accounts, [sender, recipient]);

            let decoded: SystemInstruction = bincode::deserialize(&ix.data).unwrap();
            assert_eq!(decoded, SystemInstruction::Transfer { lamports: units });
        }
    }

    #[test]
    fn token_transfer_goes_between_derived_accounts() {
        let sender = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();
        let units = parse_units("12.5", Asset::Usdt.decimals()).unwrap();

        let ix = transfer_instruction(Asset::Usdt, &sender, &recipient, units).unwrap();

        assert_eq!(ix.program_id, spl_token::id());
        assert_eq!(ix.accounts[0].pubkey, derive_token_account(&sender, &USDT_MINT));
        assert_eq!(ix.accounts[1].pubkey, derive_token_account(&recipient, &USDT_MINT));
        assert_eq!(ix.accounts[2].pubkey, sender);
        assert!(ix.accounts[2].is_signer);
        assert_eq!(
            TokenInstruction::unpack(&ix.data).unwrap(),
            TokenInstruction::Transfer { amount: 12_500_000 }
        );
    }

    #[test]
    fn token_mints_are_not_mixed_up() {
        let sender = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();
        let ix = transfer_instruction(Asset::Usdc, &sender, &recipient, 1).unwrap();
        assert_eq!(ix.accounts[0].pubkey, derive_token_account(&sender, &USDC_MINT));
    }

    #[tokio::test]
    async fn blockhash_failure_aborts_the_build() {
        let ledger = FakeLedger::default();
        ledger.fail_blockhash("rpc down");
        let err = build_transfer(
            &ledger,
            Asset::Sol,
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            1,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WalletError::Ledger(_)));
    }

    #[tokio::test]
    async fn fee_estimate_comes_from_the_ledger() {
        let ledger = FakeLedger::default();
        ledger.set_fee(5_000);
        let transfer = build_transfer(
            &ledger,
            Asset::Usdc,
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            1_000_000,
        )
        .await
        .unwrap();
        assert_eq!(estimate_fee(&ledger, &transfer).await.unwrap(), 5_000);
    }
}
