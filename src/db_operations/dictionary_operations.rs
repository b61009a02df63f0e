use super::core::DbOperations;
use crate::error::MapResult;
use crate::registry::Dictionary;

impl DbOperations {
    pub fn store_dictionary(&self, dictionary: &Dictionary) -> MapResult<()> {
        self.store_in_tree(&self.dictionaries_tree, &dictionary.id, dictionary)
    }

    pub fn get_dictionary(&self, id: &str) -> MapResult<Option<Dictionary>> {
        self.get_from_tree(&self.dictionaries_tree, id)
    }

    pub fn list_dictionaries(&self) -> MapResult<Vec<Dictionary>> {
        self.list_items_in_tree(&self.dictionaries_tree)
    }

    /// Linear scan; dictionaries are few and codes are not indexed.
    pub fn find_dictionary_by_code(&self, code: &str) -> MapResult<Option<Dictionary>> {
        Ok(self
            .list_dictionaries()?
            .into_iter()
            .find(|dictionary| dictionary.code == code))
    }

    pub fn delete_dictionary(&self, id: &str) -> MapResult<bool> {
        self.delete_from_tree(&self.dictionaries_tree, id)
    }
}
