use crate::error::{Result, UserError};
use crate::ids::UserId;
use crate::types::{self, CreateUserRequest, UpdateUserRequest, User};
use crate::users::UserRepository;
use async_trait::async_trait;
use aws_config::{timeout::TimeoutConfig, BehaviorVersion};
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{
    AttributeValue, ReturnValue, ReturnValuesOnConditionCheckFailure, Select,
};
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;

const ENTITY_TYPE: &str = "user";
const UPDATE_ATTEMPTS: usize = 3;

type Item = HashMap<String, AttributeValue>;

/// Where and how to reach the users table
#[derive(Debug, Clone)]
pub struct DynamoSettings {
    pub table_name: String,
    /// Explicit endpoint, e.g. DynamoDB Local. `None` resolves from the region.
    pub endpoint: Option<String>,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
}

/// User repository over a single DynamoDB table (PK = SK = USER#<id>)
pub struct DynamoUserRepository {
    settings: DynamoSettings,
    client: OnceCell<DynamoClient>,
}

impl DynamoUserRepository {
    pub fn new(settings: DynamoSettings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.settings.table_name
    }

    /// Build the client on first use; later calls return the same client
    pub async fn connect(&self) -> &DynamoClient {
        self.client
            .get_or_init(|| async {
                tracing::info!(
                    "Connecting to DynamoDB table {} (endpoint: {})",
                    self.settings.table_name,
                    self.settings.endpoint.as_deref().unwrap_or("default")
                );
                build_client(&self.settings).await
            })
            .await
    }
}

async fn build_client(settings: &DynamoSettings) -> DynamoClient {
    let timeouts = TimeoutConfig::builder()
        .connect_timeout(settings.connect_timeout)
        .operation_attempt_timeout(settings.operation_timeout)
        .build();

    let config = aws_config::defaults(BehaviorVersion::latest())
        .timeout_config(timeouts)
        .load()
        .await;

    let mut builder = aws_sdk_dynamodb::config::Builder::from(&config);
    if let Some(endpoint) = &settings.endpoint {
        builder = builder.endpoint_url(endpoint);
    }
    DynamoClient::from_conf(builder.build())
}

#[async_trait]
impl UserRepository for DynamoUserRepository {
    async fn get(&self, id: &UserId) -> Result<User> {
        let client = self.connect().await;
        let pk = user_key(id);

        let result = client
            .get_item()
            .table_name(self.table_name())
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await?;

        match result.item() {
            Some(item) => user_from_item(item),
            None => Err(UserError::NotFound),
        }
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<User>, u64)> {
        let client = self.connect().await;

        let mut users = Vec::new();
        let mut skipped = 0u64;
        let mut start_key: Option<Item> = None;

        // Scan pages until the window is filled or the table is exhausted.
        // The offset is skipped client-side, so deep pages read every item
        // before them, and count() scans the whole table on each call.
        while (users.len() as u64) < limit {
            let result = client
                .scan()
                .table_name(self.table_name())
                .filter_expression("entity_type = :entity")
                .expression_attribute_values(":entity", AttributeValue::S(ENTITY_TYPE.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await?;

            for item in result.items() {
                if skipped < offset {
                    skipped += 1;
                    continue;
                }
                if (users.len() as u64) >= limit {
                    break;
                }
                users.push(user_from_item(item)?);
            }

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        let total = self.count(client).await?;
        Ok((users, total))
    }

    async fn create(&self, input: CreateUserRequest) -> Result<User> {
        let user = input.into_user(UserId::generate(), types::now())?;
        let client = self.connect().await;

        client
            .put_item()
            .table_name(self.table_name())
            .set_item(Some(user_to_item(&user)))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await?;

        tracing::info!("User created: {}", user.id);
        Ok(user)
    }

    async fn update(&self, id: &UserId, patch: UpdateUserRequest) -> Result<User> {
        patch.validate()?;
        let client = self.connect().await;
        let pk = user_key(id);
        let mut stamp = types::now();

        for _ in 0..UPDATE_ATTEMPTS {
            let (expression, names, values) = update_expression(&patch, &stamp);

            let result = client
                .update_item()
                .table_name(self.table_name())
                .key("PK", AttributeValue::S(pk.clone()))
                .key("SK", AttributeValue::S(pk.clone()))
                .update_expression(expression)
                .set_expression_attribute_names(Some(names))
                .set_expression_attribute_values(Some(values))
                // updated_at never moves backwards, whatever this host's clock says
                .condition_expression(
                    "attribute_exists(PK) AND (attribute_not_exists(#updated_at) OR #updated_at <= :updated_at)",
                )
                .return_values(ReturnValue::AllNew)
                .return_values_on_condition_check_failure(
                    ReturnValuesOnConditionCheckFailure::AllOld,
                )
                .send()
                .await;

            let err = match result {
                Ok(output) => {
                    return match output.attributes() {
                        Some(item) => user_from_item(item),
                        None => Err(UserError::store("update returned no attributes")),
                    }
                }
                Err(err) => err,
            };

            let conflict = match err.as_service_error() {
                Some(UpdateItemError::ConditionalCheckFailedException(failed)) => {
                    Some(failed.item().cloned())
                }
                _ => None,
            };

            match conflict {
                None => return Err(err.into()),
                Some(None) => return Err(UserError::NotFound),
                Some(Some(current)) => {
                    let prior = time_attr(&current, "updated_at")?;
                    tracing::warn!(
                        "Stored updated_at of {} ({}) is ahead of the local clock, retrying",
                        id,
                        timestamp(&prior)
                    );
                    stamp = prior.max(types::now());
                }
            }
        }

        Err(UserError::store(format!(
            "update of {} conflicted {} times",
            id, UPDATE_ATTEMPTS
        )))
    }

    async fn delete(&self, id: &UserId) -> Result<()> {
        let client = self.connect().await;
        let pk = user_key(id);

        let result = client
            .delete_item()
            .table_name(self.table_name())
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .return_values(ReturnValue::AllOld)
            .send()
            .await?;

        match result.attributes() {
            Some(old) if !old.is_empty() => {
                tracing::info!("User deleted: {}", id);
                Ok(())
            }
            _ => Err(UserError::NotFound),
        }
    }

    async fn health_check(&self) -> Result<()> {
        let client = self.connect().await;
        client
            .describe_table()
            .table_name(self.table_name())
            .send()
            .await?;
        Ok(())
    }
}

impl DynamoUserRepository {
    async fn count(&self, client: &DynamoClient) -> Result<u64> {
        let mut total = 0u64;
        let mut start_key: Option<Item> = None;

        loop {
            let result = client
                .scan()
                .table_name(self.table_name())
                .select(Select::Count)
                .filter_expression("entity_type = :entity")
                .expression_attribute_values(":entity", AttributeValue::S(ENTITY_TYPE.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await?;

            total += u64::try_from(result.count()).unwrap_or(0);

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => return Ok(total),
            }
        }
    }
}

impl<E, R> From<SdkError<E, R>> for UserError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    fn from(err: SdkError<E, R>) -> Self {
        UserError::Store(DisplayErrorContext(&err).to_string())
    }
}

/// SET expression over the provided fields plus `updated_at = stamp`
fn update_expression(
    patch: &UpdateUserRequest,
    stamp: &DateTime<Utc>,
) -> (String, HashMap<String, String>, Item) {
    let mut update_expr = vec![];
    let mut expr_names = HashMap::new();
    let mut expr_values = HashMap::new();

    let mut set = |field: &str, value: AttributeValue| {
        update_expr.push(format!("#{field} = :{field}"));
        expr_names.insert(format!("#{field}"), field.to_string());
        expr_values.insert(format!(":{field}"), value);
    };

    if let Some(first) = &patch.first {
        set("first", AttributeValue::S(first.clone()));
    }
    if let Some(last) = &patch.last {
        set("last", AttributeValue::S(last.clone()));
    }
    if let Some(email) = &patch.email {
        set("email", AttributeValue::S(email.clone()));
    }
    if let Some(status) = patch.status {
        set("status", AttributeValue::S(status.as_str().to_string()));
    }
    if let Some(age) = patch.age {
        set("age", AttributeValue::N(age.to_string()));
    }
    if let Some(city) = &patch.city {
        set("city", AttributeValue::S(city.clone()));
    }
    if let Some(country) = &patch.country {
        set("country", AttributeValue::S(country.clone()));
    }
    if let Some(roles) = &patch.roles {
        set("roles", roles_value(roles));
    }
    set("updated_at", AttributeValue::S(timestamp(stamp)));

    (format!("SET {}", update_expr.join(", ")), expr_names, expr_values)
}

fn user_key(id: &UserId) -> String {
    format!("USER#{}", id)
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn roles_value(roles: &[String]) -> AttributeValue {
    AttributeValue::L(roles.iter().cloned().map(AttributeValue::S).collect())
}

fn user_to_item(user: &User) -> Item {
    let pk = user_key(&user.id);
    let mut item = HashMap::from([
        ("PK".to_string(), AttributeValue::S(pk.clone())),
        ("SK".to_string(), AttributeValue::S(pk)),
        ("entity_type".to_string(), AttributeValue::S(ENTITY_TYPE.to_string())),
        ("first".to_string(), AttributeValue::S(user.first.clone())),
        ("last".to_string(), AttributeValue::S(user.last.clone())),
        ("email".to_string(), AttributeValue::S(user.email.clone())),
        ("status".to_string(), AttributeValue::S(user.status.as_str().to_string())),
        ("roles".to_string(), roles_value(&user.roles)),
        ("created_at".to_string(), AttributeValue::S(timestamp(&user.created_at))),
        ("updated_at".to_string(), AttributeValue::S(timestamp(&user.updated_at))),
    ]);

    if let Some(age) = user.age {
        item.insert("age".to_string(), AttributeValue::N(age.to_string()));
    }
    if let Some(city) = &user.city {
        item.insert("city".to_string(), AttributeValue::S(city.clone()));
    }
    if let Some(country) = &user.country {
        item.insert("country".to_string(), AttributeValue::S(country.clone()));
    }
    item
}

fn string_attr(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}

fn time_attr(item: &Item, key: &str) -> Result<DateTime<Utc>> {
    string_attr(item, key)
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| UserError::store(format!("user document has malformed {}", key)))
}

fn user_from_item(item: &Item) -> Result<User> {
    let id = string_attr(item, "PK")
        .as_deref()
        .and_then(|pk| pk.strip_prefix("USER#"))
        .and_then(|raw| UserId::decode(raw).ok())
        .ok_or_else(|| UserError::store("user document has malformed PK"))?;

    Ok(User {
        id,
        first: string_attr(item, "first").unwrap_or_default(),
        last: string_attr(item, "last").unwrap_or_default(),
        email: string_attr(item, "email").unwrap_or_default(),
        status: string_attr(item, "status")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default(),
        age: item
            .get("age")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse().ok()),
        city: string_attr(item, "city"),
        country: string_attr(item, "country"),
        roles: item
            .get("roles")
            .and_then(|v| v.as_l().ok())
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_s().ok().cloned())
                    .collect()
            })
            .unwrap_or_default(),
        created_at: time_attr(item, "created_at")?,
        updated_at: time_attr(item, "updated_at")?,
    })
}
