//! Counts views of a CloudFront distribution. Attach to a viewer or
//! origin response trigger.

use view_counter::{counter::DynamoDbStore, views::edge::EdgeViews};

pub fn main() -> anyhow::Result<()> {
    view_counter::exec_tokio::<_, _, EdgeViews<DynamoDbStore>, _>()
}
