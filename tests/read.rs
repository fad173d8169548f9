use view_counter::counter::MemoryStore;
use view_counter::views::read::{GetViews, ReadResponse};

#[test]
fn test_read_lambda() {
    let test_data = include_str!("./read.json");
    let responses =
        view_counter::exec_test::<_, _, GetViews<MemoryStore>, ReadResponse>(test_data)
            .expect("Unable to execute lambda");
    let expected = ReadResponse {
        status_code: 200,
        body: "0".into(),
    };
    assert_eq!(responses, vec![expected.clone(), expected]);
}

#[test]
fn test_read_lambda_rejects_invalid_test_data() {
    let res = view_counter::exec_test::<_, _, GetViews<MemoryStore>, ReadResponse>("{}");
    assert!(res.is_err());
}
