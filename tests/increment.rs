use view_counter::counter::MemoryStore;
use view_counter::views::increment::IncrementViews;

#[test]
fn test_increment_lambda() {
    let test_data = include_str!("./increment.json");
    let counts = view_counter::exec_test::<_, _, IncrementViews<MemoryStore>, u64>(test_data)
        .expect("Unable to execute lambda");
    assert_eq!(counts, vec![1, 2, 3]);
}
