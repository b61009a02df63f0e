use super::core::DbOperations;
use crate::error::MapResult;
use crate::registry::FunctionDefinition;

impl DbOperations {
    pub fn store_function(&self, function: &FunctionDefinition) -> MapResult<()> {
        self.store_in_tree(&self.functions_tree, &function.id, function)
    }

    pub fn get_function(&self, id: &str) -> MapResult<Option<FunctionDefinition>> {
        self.get_from_tree(&self.functions_tree, id)
    }

    pub fn list_functions(&self) -> MapResult<Vec<FunctionDefinition>> {
        self.list_items_in_tree(&self.functions_tree)
    }

    pub fn delete_function(&self, id: &str) -> MapResult<bool> {
        self.delete_from_tree(&self.functions_tree, id)
    }
}
