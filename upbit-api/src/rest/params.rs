use std::borrow::Cow;

use url::Url;

#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    params: Vec<(Cow<'static, str>, String)>,
}

impl QueryParams {
    pub fn push<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<Cow<'static, str>>,
        V: ToString,
    {
        self.params.push((key.into(), value.to_string()));
        return self;
    }

    pub fn push_opt<K, V>(&mut self, key: K, value: Option<V>) -> &mut Self
    where
        K: Into<Cow<'static, str>>,
        V: ToString,
    {
        if let Some(value) = value {
            self.push(key, value);
        }
        return self;
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        return self
            .params
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_str());
    }

    /// Writes every parameter into the query string of `url`. Parameters never
    /// travel in a request body, upstream ignores them there.
    pub fn add_to_url(&self, url: &mut Url) {
        if self.params.is_empty() {
            return;
        }
        url.query_pairs_mut()
            .extend_pairs(self.params.iter().map(|(k, v)| (k.as_ref(), v.as_str())));
    }
}
