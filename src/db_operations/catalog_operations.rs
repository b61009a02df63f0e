use super::core::DbOperations;
use crate::catalog::{Bank, StandardProtocol, TransactionType};
use crate::error::MapResult;
use crate::rules::TransformRule;

impl DbOperations {
    // ========== BANKS ==========

    pub fn store_bank(&self, bank: &Bank) -> MapResult<()> {
        self.store_in_tree(&self.banks_tree, &bank.id, bank)
    }

    pub fn get_bank(&self, id: &str) -> MapResult<Option<Bank>> {
        self.get_from_tree(&self.banks_tree, id)
    }

    pub fn list_banks(&self) -> MapResult<Vec<Bank>> {
        self.list_items_in_tree(&self.banks_tree)
    }

    pub fn delete_bank(&self, id: &str) -> MapResult<bool> {
        self.delete_from_tree(&self.banks_tree, id)
    }

    // ========== TRANSACTION TYPES ==========

    pub fn store_transaction_type(&self, transaction_type: &TransactionType) -> MapResult<()> {
        self.store_in_tree(&self.transaction_types_tree, &transaction_type.id, transaction_type)
    }

    pub fn get_transaction_type(&self, id: &str) -> MapResult<Option<TransactionType>> {
        self.get_from_tree(&self.transaction_types_tree, id)
    }

    pub fn list_transaction_types(&self) -> MapResult<Vec<TransactionType>> {
        self.list_items_in_tree(&self.transaction_types_tree)
    }

    pub fn delete_transaction_type(&self, id: &str) -> MapResult<bool> {
        self.delete_from_tree(&self.transaction_types_tree, id)
    }

    // ========== STANDARD PROTOCOLS ==========

    pub fn store_protocol(&self, protocol: &StandardProtocol) -> MapResult<()> {
        self.store_in_tree(&self.protocols_tree, &protocol.id, protocol)
    }

    pub fn get_protocol(&self, id: &str) -> MapResult<Option<StandardProtocol>> {
        self.get_from_tree(&self.protocols_tree, id)
    }

    pub fn list_protocols(&self) -> MapResult<Vec<StandardProtocol>> {
        self.list_items_in_tree(&self.protocols_tree)
    }

    pub fn delete_protocol(&self, id: &str) -> MapResult<bool> {
        self.delete_from_tree(&self.protocols_tree, id)
    }

    // ========== LEGACY RULES ==========

    pub fn store_rule(&self, rule: &TransformRule) -> MapResult<()> {
        self.store_in_tree(&self.rules_tree, &rule.id, rule)
    }

    pub fn get_rule(&self, id: &str) -> MapResult<Option<TransformRule>> {
        self.get_from_tree(&self.rules_tree, id)
    }

    pub fn list_rules(&self) -> MapResult<Vec<TransformRule>> {
        self.list_items_in_tree(&self.rules_tree)
    }

    pub fn delete_rule(&self, id: &str) -> MapResult<bool> {
        self.delete_from_tree(&self.rules_tree, id)
    }
}
