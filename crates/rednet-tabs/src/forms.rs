//! Per-tab form field state (spec §4.6 "Form data"): `url -> formId ->
//! {field -> value}`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormData {
    urls: HashMap<String, HashMap<String, HashMap<String, String>>>,
}

impl FormData {
    pub fn set_field(&mut self, url: &str, form_id: &str, field: &str, value: &str) {
        self.urls
            .entry(url.to_string())
            .or_default()
            .entry(form_id.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    pub fn get_form(&self, url: &str, form_id: &str) -> Option<&HashMap<String, String>> {
        self.urls.get(url)?.get(form_id)
    }

    /// Remove form state for `url`; if `form_id` is given, only that form.
    pub fn clear(&mut self, url: &str, form_id: Option<&str>) {
        match form_id {
            Some(form_id) => {
                if let Some(forms) = self.urls.get_mut(url) {
                    forms.remove(form_id);
                }
            },
            None => {
                self.urls.remove(url);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_a_field() {
        let mut forms = FormData::default();
        forms.set_field("shop.comp1.rednet/checkout", "f1", "email", "a@b");
        assert_eq!(forms.get_form("shop.comp1.rednet/checkout", "f1").unwrap()["email"], "a@b");
    }

    #[test]
    fn clear_scoped_to_one_form_leaves_others() {
        let mut forms = FormData::default();
        forms.set_field("u", "f1", "a", "1");
        forms.set_field("u", "f2", "b", "2");
        forms.clear("u", Some("f1"));
        assert!(forms.get_form("u", "f1").is_none());
        assert!(forms.get_form("u", "f2").is_some());
    }

    #[test]
    fn clear_without_form_id_removes_all_forms_for_url() {
        let mut forms = FormData::default();
        forms.set_field("u", "f1", "a", "1");
        forms.clear("u", None);
        assert!(forms.get_form("u", "f1").is_none());
    }
}
