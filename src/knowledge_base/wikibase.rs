use std::collections::HashMap;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use parking_lot::Mutex;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value as Json};
use tracing::{debug, info, warn};

use super::merge::{is_noop, plan_claims, ClaimPlan};
use super::{ExistingClaim, KnowledgeBase, RecordSnapshot, RecordUpdate, LANGUAGE};
use crate::domain::vocabulary::props;
use crate::domain::{ExternalKey, Release, Statement, Value};

const DEFAULT_API_ENDPOINT: &str = "https://www.wikidata.org/w/api.php";
const DEFAULT_SPARQL_ENDPOINT: &str = "https://query.wikidata.org/sparql";
const DEFAULT_CONCEPT_URI: &str = "http://www.wikidata.org/";
const DEFAULT_USER_AGENT: &str = "doid-sync/0.1 (+https://github.com/)";
const CALENDAR_MODEL: &str = "http://www.wikidata.org/entity/Q1985727";
const MAX_FETCH_ATTEMPTS: u32 = 4;
const RETRY_BASE_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct WikibaseConfig {
    pub api_endpoint: String,
    pub sparql_endpoint: String,
    pub concept_uri: String,
    pub access_token: Option<String>,
    pub user_agent: String,
    pub fast_run: bool,
    pub timeout: Duration,
}

impl WikibaseConfig {
    pub fn new() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            sparql_endpoint: DEFAULT_SPARQL_ENDPOINT.to_string(),
            concept_uri: DEFAULT_CONCEPT_URI.to_string(),
            access_token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fast_run: true,
            timeout: Duration::from_secs(120),
        }
    }

    /// Reads `WIKIBASE_API_URL`, `WIKIBASE_SPARQL_URL` and `WIKIBASE_TOKEN`.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(endpoint) = std::env::var("WIKIBASE_API_URL") {
            config = config.with_api_endpoint(endpoint);
        }
        if let Ok(endpoint) = std::env::var("WIKIBASE_SPARQL_URL") {
            config = config.with_sparql_endpoint(endpoint);
        }
        if let Ok(token) = std::env::var("WIKIBASE_TOKEN") {
            config = config.with_access_token(token);
        }
        config
    }

    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = endpoint.into();
        self
    }

    pub fn with_sparql_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.sparql_endpoint = endpoint.into();
        self
    }

    pub fn with_concept_uri(mut self, uri: impl Into<String>) -> Self {
        self.concept_uri = uri.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_fast_run(mut self, fast_run: bool) -> Self {
        self.fast_run = fast_run;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn entity_iri(&self, id: &str) -> String {
        format!("{}entity/{}", self.concept_uri, id)
    }

    fn direct_property_iri(&self, property: &str) -> String {
        format!("{}prop/direct/{}", self.concept_uri, property)
    }
}

impl Default for WikibaseConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for a Wikibase instance: SPARQL for lookups, the action API for
/// reads and edits.
pub struct WikibaseClient {
    http: HttpClient,
    config: WikibaseConfig,
    id_cache: Mutex<HashMap<String, HashMap<String, String>>>,
    csrf_token: Mutex<Option<String>>,
}

impl WikibaseClient {
    pub fn new(config: WikibaseConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .context("cannot build HTTP client for Wikibase")?;

        Ok(Self {
            http,
            config,
            id_cache: Mutex::new(HashMap::new()),
            csrf_token: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &WikibaseConfig {
        &self.config
    }

    fn sparql(&self, query: &str) -> Result<Vec<SparqlBinding>> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self
                .http
                .post(&self.config.sparql_endpoint)
                .header(ACCEPT, "application/sparql-results+json")
                .form(&[("query", query)])
                .send()
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: SparqlResponse = response
                            .json()
                            .context("cannot parse SPARQL response")?;
                        return Ok(parsed.results.bindings);
                    }

                    if should_retry_status(status) && attempt < MAX_FETCH_ATTEMPTS {
                        warn!(
                            attempt,
                            status = status.as_u16(),
                            "SPARQL endpoint returned an error status, retrying"
                        );
                        sleep(retry_delay(attempt));
                        continue;
                    }

                    return Err(anyhow!("SPARQL endpoint returned status {}", status));
                }
                Err(err) => {
                    if attempt < MAX_FETCH_ATTEMPTS {
                        warn!(attempt, error = %err, "SPARQL request failed, retrying");
                        sleep(retry_delay(attempt));
                        continue;
                    }

                    return Err(anyhow!("SPARQL request failed: {err}"));
                }
            }
        }
    }

    fn query_id_mapping(&self, property: &str) -> Result<HashMap<String, String>> {
        let query = format!(
            "SELECT ?item ?value WHERE {{ ?item <{}> ?value }}",
            self.config.direct_property_iri(property)
        );
        let mut mapping = HashMap::new();
        for binding in self.sparql(&query)? {
            let (Some(item), Some(value)) = (binding.get("item"), binding.get("value")) else {
                continue;
            };
            if let Some(id) = entity_id(&item.value) {
                mapping.insert(value.value.clone(), id.to_string());
            }
        }
        info!(property, records = mapping.len(), "loaded identifier mapping");
        Ok(mapping)
    }

    fn resolve(&self, key: &ExternalKey) -> Result<Option<String>> {
        if self.config.fast_run {
            return self.cached_record_id(key);
        }

        let query = format!(
            "SELECT ?item WHERE {{ ?item <{}> {} }} LIMIT 1",
            self.config.direct_property_iri(&key.property),
            sparql_literal(&key.value)
        );
        Ok(self
            .sparql(&query)?
            .into_iter()
            .find_map(|binding| binding.get("item").and_then(|v| entity_id(&v.value)).map(str::to_string)))
    }

    /// Looks `key` up in the cached mapping, loading it on first use.
    fn cached_record_id(&self, key: &ExternalKey) -> Result<Option<String>> {
        if let Some(mapping) = self.id_cache.lock().get(&key.property) {
            return Ok(mapping.get(&key.value).cloned());
        }
        let mapping = self.query_id_mapping(&key.property)?;
        let id = mapping.get(&key.value).cloned();
        self.id_cache.lock().insert(key.property.clone(), mapping);
        Ok(id)
    }

    fn remember(&self, key: &ExternalKey, id: &str) {
        if let Some(mapping) = self.id_cache.lock().get_mut(&key.property) {
            mapping.insert(key.value.clone(), id.to_string());
        }
    }

    fn fetch_entity(&self, id: &str) -> Result<RecordSnapshot> {
        let response: Json = self
            .http
            .get(&self.config.api_endpoint)
            .query(&[
                ("action", "wbgetentities"),
                ("ids", id),
                ("props", "labels|descriptions|aliases|claims|sitelinks"),
                ("languages", LANGUAGE),
                ("format", "json"),
            ])
            .send()
            .with_context(|| format!("cannot fetch entity {id}"))?
            .error_for_status()
            .with_context(|| format!("Wikibase refused entity {id}"))?
            .json()
            .context("cannot parse wbgetentities response")?;

        if let Some(error) = response.get("error") {
            bail!("wbgetentities failed for {id}: {}", api_error_info(error));
        }
        let entity = response
            .get("entities")
            .and_then(|entities| entities.get(id))
            .ok_or_else(|| anyhow!("entity {id} missing from response"))?;
        Ok(parse_entity(id, entity))
    }

    fn authorized(&self, request: reqwest::blocking::RequestBuilder) -> Result<reqwest::blocking::RequestBuilder> {
        let token = self
            .config
            .access_token
            .as_deref()
            .ok_or_else(|| anyhow!("an access token is required to edit"))?;
        Ok(request.bearer_auth(token))
    }

    fn csrf_token(&self) -> Result<String> {
        if let Some(token) = self.csrf_token.lock().clone() {
            return Ok(token);
        }

        let request = self.http.get(&self.config.api_endpoint).query(&[
            ("action", "query"),
            ("meta", "tokens"),
            ("type", "csrf"),
            ("format", "json"),
        ]);
        let response: Json = self
            .authorized(request)?
            .send()
            .context("cannot request an edit token")?
            .error_for_status()
            .context("Wikibase refused the edit token request")?
            .json()
            .context("cannot parse edit token response")?;

        let token = response
            .pointer("/query/tokens/csrftoken")
            .and_then(Json::as_str)
            .filter(|token| *token != "+\\")
            .ok_or_else(|| anyhow!("Wikibase did not issue an edit token"))?
            .to_string();
        *self.csrf_token.lock() = Some(token.clone());
        Ok(token)
    }

    /// Submits `data` through `wbeditentity`, creating an item when `id` is `None`.
    fn submit(&self, id: Option<&str>, data: &Json, summary: &str) -> Result<String> {
        let token = self.csrf_token()?;
        let data = data.to_string();
        let mut form: Vec<(&str, &str)> = vec![
            ("action", "wbeditentity"),
            ("data", data.as_str()),
            ("summary", summary),
            ("bot", "1"),
            ("format", "json"),
            ("token", token.as_str()),
        ];
        match id {
            Some(id) => form.push(("id", id)),
            None => form.push(("new", "item")),
        }

        let request = self.http.post(&self.config.api_endpoint).form(&form);
        let response: Json = self
            .authorized(request)?
            .send()
            .context("wbeditentity request failed")?
            .error_for_status()
            .context("Wikibase refused the edit")?
            .json()
            .context("cannot parse wbeditentity response")?;

        if let Some(error) = response.get("error") {
            if error.get("code").and_then(Json::as_str) == Some("badtoken") {
                *self.csrf_token.lock() = None;
            }
            bail!("wbeditentity failed: {}", api_error_info(error));
        }
        response
            .pointer("/entity/id")
            .and_then(Json::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("wbeditentity response carries no entity id"))
    }
}

impl KnowledgeBase for WikibaseClient {
    fn id_mapping(&self, property: &str) -> Result<HashMap<String, String>> {
        if !self.config.fast_run {
            return self.query_id_mapping(property);
        }
        if let Some(mapping) = self.id_cache.lock().get(property) {
            return Ok(mapping.clone());
        }
        let mapping = self.query_id_mapping(property)?;
        self.id_cache
            .lock()
            .insert(property.to_string(), mapping.clone());
        Ok(mapping)
    }

    fn find_record(&self, key: &ExternalKey) -> Result<Option<RecordSnapshot>> {
        match self.resolve(key)? {
            Some(id) => self.fetch_entity(&id).map(Some),
            None => Ok(None),
        }
    }

    fn write_record(
        &self,
        update: &RecordUpdate,
        existing: Option<&RecordSnapshot>,
    ) -> Result<String> {
        let empty = RecordSnapshot::default();
        let current = existing.unwrap_or(&empty);
        let plan = plan_claims(&current.claims, &update.statements, &update.append_properties);
        if let Some(snapshot) = existing {
            if is_noop(update, current, &plan) {
                debug!(key = %update.key, id = %snapshot.id, "record already up to date");
                return Ok(snapshot.id.clone());
            }
        }

        let data = edit_payload(update, &plan);
        let summary = format!("Update {} from the Disease Ontology", update.key.value);
        let id = self.submit(existing.map(|snapshot| snapshot.id.as_str()), &data, &summary)?;
        self.remember(&update.key, &id);
        Ok(id)
    }

    fn find_release(&self, release: &Release) -> Result<Option<String>> {
        let query = format!(
            "SELECT ?item WHERE {{ ?item <{}> <{}> ; <{}> {} }} LIMIT 1",
            self.config.direct_property_iri(props::EDITION_OF),
            self.config.entity_iri(&release.edition_of),
            self.config.direct_property_iri(props::EDITION_NUMBER),
            sparql_literal(&release.edition)
        );
        let found = self
            .sparql(&query)?
            .into_iter()
            .find_map(|binding| binding.get("item").and_then(|v| entity_id(&v.value)).map(str::to_string));
        if let Some(id) = &found {
            info!(release = %release.title, id = %id, "release record found");
        }
        Ok(found)
    }

    fn get_or_create_release(&self, release: &Release) -> Result<String> {
        if let Some(id) = self.find_release(release)? {
            return Ok(id);
        }

        let data = release_payload(release);
        let id = self.submit(None, &data, &format!("Create {}", release.title))?;
        info!(release = %release.title, id = %id, "release record created");
        Ok(id)
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
            | StatusCode::REQUEST_TIMEOUT
            | StatusCode::INTERNAL_SERVER_ERROR
    )
}

fn retry_delay(attempt: u32) -> Duration {
    let step = 1u64 << (attempt.saturating_sub(1));
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(step))
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<SparqlBinding>,
}

type SparqlBinding = HashMap<String, SparqlValue>;

#[derive(Debug, Deserialize)]
struct SparqlValue {
    #[serde(rename = "type")]
    _value_type: String,
    value: String,
}

fn entity_id(uri: &str) -> Option<&str> {
    uri.rsplit('/').next().filter(|id| !id.is_empty())
}

fn sparql_literal(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn api_error_info(error: &Json) -> String {
    error
        .get("info")
        .and_then(Json::as_str)
        .or_else(|| error.get("code").and_then(Json::as_str))
        .unwrap_or("unknown error")
        .to_string()
}

fn parse_entity(id: &str, entity: &Json) -> RecordSnapshot {
    let term = |field: &str| {
        entity
            .pointer(&format!("/{field}/{LANGUAGE}/value"))
            .and_then(Json::as_str)
            .map(str::to_string)
    };

    let aliases = entity
        .pointer(&format!("/aliases/{LANGUAGE}"))
        .and_then(Json::as_array)
        .map(|aliases| {
            aliases
                .iter()
                .filter_map(|alias| alias.get("value").and_then(Json::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let sitelinks = entity
        .get("sitelinks")
        .and_then(Json::as_object)
        .map(|links| {
            links
                .iter()
                .filter_map(|(site, link)| {
                    let title = link.get("title").and_then(Json::as_str)?;
                    Some((site.clone(), title.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut claims = Vec::new();
    if let Some(by_property) = entity.get("claims").and_then(Json::as_object) {
        for (property, list) in by_property {
            for claim in list.as_array().into_iter().flatten() {
                let Some(claim_id) = claim.get("id").and_then(Json::as_str) else {
                    continue;
                };
                let Some(value) = claim.pointer("/mainsnak/datavalue").and_then(datavalue_text)
                else {
                    continue;
                };
                let stated_in = claim
                    .get("references")
                    .and_then(Json::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(|reference| reference.get("snaks")?.get(props::STATED_IN))
                    .filter_map(Json::as_array)
                    .flatten()
                    .filter_map(|snak| snak.pointer("/datavalue/value/id").and_then(Json::as_str))
                    .map(str::to_string)
                    .collect();
                claims.push(ExistingClaim {
                    stated_in,
                    ..ExistingClaim::new(claim_id, property.clone(), value)
                });
            }
        }
    }

    RecordSnapshot {
        id: id.to_string(),
        label: term("labels"),
        description: term("descriptions"),
        aliases,
        sitelinks,
        claims,
    }
}

fn datavalue_text(datavalue: &Json) -> Option<String> {
    let value = datavalue.get("value")?;
    let text = match datavalue.get("type").and_then(Json::as_str)? {
        "string" => value.as_str(),
        "wikibase-entityid" => value.get("id").and_then(Json::as_str),
        "time" => value.get("time").and_then(Json::as_str),
        "monolingualtext" => value.get("text").and_then(Json::as_str),
        "quantity" => value.get("amount").and_then(Json::as_str),
        _ => None,
    }?;
    Some(text.to_string())
}

fn datavalue_json(value: &Value) -> Json {
    match value {
        Value::Item(id) => json!({
            "type": "wikibase-entityid",
            "value": {"entity-type": "item", "id": id}
        }),
        Value::ExternalId(text) | Value::String(text) | Value::Url(text) => {
            json!({"type": "string", "value": text})
        }
        Value::Time { time, precision } => json!({
            "type": "time",
            "value": {
                "time": time,
                "timezone": 0,
                "before": 0,
                "after": 0,
                "precision": precision,
                "calendarmodel": CALENDAR_MODEL
            }
        }),
    }
}

fn snak_json(property: &str, value: &Value) -> Json {
    json!({
        "snaktype": "value",
        "property": property,
        "datavalue": datavalue_json(value)
    })
}

fn statement_json(statement: &Statement) -> Json {
    let references: Vec<Json> = statement
        .references
        .iter()
        .map(|reference| {
            let mut snaks = Map::new();
            let mut order: Vec<String> = Vec::new();
            for snak in &reference.snaks {
                if let Some(list) = snaks
                    .entry(snak.property.clone())
                    .or_insert_with(|| json!([]))
                    .as_array_mut()
                {
                    list.push(snak_json(&snak.property, &snak.value));
                }
                if !order.contains(&snak.property) {
                    order.push(snak.property.clone());
                }
            }
            json!({"snaks": snaks, "snaks-order": order})
        })
        .collect();

    json!({
        "mainsnak": snak_json(&statement.property, &statement.value),
        "type": "statement",
        "rank": "normal",
        "references": references
    })
}

fn term_json(value: &str) -> Json {
    json!({"language": LANGUAGE, "value": value})
}

fn edit_payload(update: &RecordUpdate, plan: &ClaimPlan) -> Json {
    let mut data = Map::new();
    if let Some(label) = &update.label {
        data.insert("labels".to_string(), json!({ LANGUAGE: term_json(label) }));
    }
    if let Some(description) = &update.description {
        data.insert(
            "descriptions".to_string(),
            json!({ LANGUAGE: term_json(description) }),
        );
    }
    if !update.aliases.is_empty() {
        let aliases: Vec<Json> = update
            .aliases
            .iter()
            .map(|alias| json!({"language": LANGUAGE, "value": alias, "add": ""}))
            .collect();
        data.insert("aliases".to_string(), json!({ LANGUAGE: aliases }));
    }
    if let Some(link) = &update.sitelink {
        data.insert(
            "sitelinks".to_string(),
            json!({ link.site.clone(): {"site": link.site, "title": link.title} }),
        );
    }

    let mut claims: Vec<Json> = plan.add.iter().map(statement_json).collect();
    claims.extend(plan.update.iter().map(|rewrite| {
        let mut claim = statement_json(&rewrite.statement);
        if let Some(fields) = claim.as_object_mut() {
            fields.insert("id".to_string(), json!(rewrite.id));
        }
        claim
    }));
    claims.extend(
        plan.remove
            .iter()
            .map(|id| json!({"id": id, "remove": ""})),
    );
    if !claims.is_empty() {
        data.insert("claims".to_string(), Json::Array(claims));
    }
    Json::Object(data)
}

fn release_payload(release: &Release) -> Json {
    let claims: Vec<Json> = release.statements().iter().map(statement_json).collect();
    json!({
        "labels": { LANGUAGE: term_json(&release.title) },
        "descriptions": { LANGUAGE: term_json(&release.description) },
        "claims": claims
    })
}
