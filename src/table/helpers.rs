/// Retry delay computation for batch operations
pub(crate) mod retry_config {
    use std::time::Duration;

    /// Calculate retry delay with exponential backoff
    ///
    /// # Arguments
    /// * `attempt` - The retry attempt number (0-based)
    /// * `initial` - Initial delay duration
    /// * `multiplier` - Growth factor per attempt
    /// * `max` - Maximum delay duration
    pub(crate) fn retry_delay(
        attempt: usize,
        initial: Duration,
        multiplier: u32,
        max: Duration,
    ) -> Duration {
        let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
        initial
            .saturating_mul(multiplier.saturating_pow(exponent))
            .min(max)
    }
}

/// Key condition and update expression rendering
pub(crate) mod expressions {
    use aws_sdk_dynamodb::types::AttributeValue;

    use crate::condition::ConditionExpression;
    use crate::table::types::{Index, Item, SortKeyCondition};

    /// Renders `#pk = :pk [AND <sort condition>]` for an index.
    pub(crate) struct KeyConditionBuilder {
        index: Index,
        rendered: ConditionExpression,
    }

    impl KeyConditionBuilder {
        pub(crate) fn new(index: Index) -> Self {
            Self {
                index,
                rendered: ConditionExpression::default(),
            }
        }

        pub(crate) fn with_partition_key(mut self, value: &str) -> Self {
            self.rendered.expression = "#pk = :pk".to_string();
            let _ = self
                .rendered
                .names
                .insert("#pk".to_string(), self.index.partition_attr().to_string());
            let _ = self
                .rendered
                .values
                .insert(":pk".to_string(), AttributeValue::S(value.to_string()));
            self
        }

        pub(crate) fn with_sort_key(mut self, condition: Option<&SortKeyCondition>) -> Self {
            let Some(condition) = condition else {
                return self;
            };
            let _ = self
                .rendered
                .names
                .insert("#sk".to_string(), self.index.sort_attr().to_string());

            let clause = match condition {
                SortKeyCondition::Equals(v) => self.compare("=", v),
                SortKeyCondition::LessThan(v) => self.compare("<", v),
                SortKeyCondition::LessThanOrEqual(v) => self.compare("<=", v),
                SortKeyCondition::GreaterThan(v) => self.compare(">", v),
                SortKeyCondition::GreaterThanOrEqual(v) => self.compare(">=", v),
                SortKeyCondition::BeginsWith(prefix) => {
                    self.value(":sk", prefix);
                    "begins_with(#sk, :sk)".to_string()
                }
                SortKeyCondition::Between(low, high) => {
                    self.value(":sk_low", low);
                    self.value(":sk_high", high);
                    "#sk BETWEEN :sk_low AND :sk_high".to_string()
                }
            };
            self.rendered.expression.push_str(" AND ");
            self.rendered.expression.push_str(&clause);
            self
        }

        fn compare(&mut self, operator: &str, value: &str) -> String {
            self.value(":sk", value);
            format!("#sk {operator} :sk")
        }

        fn value(&mut self, token: &str, value: &str) {
            let _ = self
                .rendered
                .values
                .insert(token.to_string(), AttributeValue::S(value.to_string()));
        }

        pub(crate) fn build(self) -> ConditionExpression {
            self.rendered
        }
    }

    /// Renders `SET #attr0 = :val0, #attr1 = :val1, ...` over the given fields.
    ///
    /// Field order is sorted so the rendering is stable.
    pub(crate) fn update_expression(fields: Item) -> ConditionExpression {
        let mut fields: Vec<_> = fields.into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let mut rendered = ConditionExpression::default();
        let mut assignments = Vec::with_capacity(fields.len());
        for (i, (name, value)) in fields.into_iter().enumerate() {
            let name_token = format!("#attr{i}");
            let value_token = format!(":val{i}");
            assignments.push(format!("{name_token} = {value_token}"));
            let _ = rendered.names.insert(name_token, name);
            let _ = rendered.values.insert(value_token, value);
        }
        rendered.expression = format!("SET {}", assignments.join(", "));
        rendered
    }

    /// Moves the placeholders of `other` into `target`, returning `other`'s text.
    pub(crate) fn merge(target: &mut ConditionExpression, other: ConditionExpression) -> String {
        target.names.extend(other.names);
        target.values.extend(other.values);
        other.expression
    }
}

/// Per-request limits of the store
pub(crate) mod batch_processor {
    /// Maximum requests in one BatchWriteItem call
    pub(crate) const BATCH_WRITE_SIZE: usize = 25;
    /// Maximum keys in one BatchGetItem call
    pub(crate) const BATCH_READ_SIZE: usize = 100;
    /// Maximum entries in one TransactWriteItems call
    pub(crate) const TRANSACT_WRITE_SIZE: usize = 25;
}
