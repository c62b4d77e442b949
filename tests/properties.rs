use proptest::prelude::*;
use strand::backend::host::{bitonic_sort_i32_program, reduce_sum_program};
use strand::prelude::*;

fn host() -> HostEnvironment {
    let config = Config::builder().host_threads(2).build().unwrap();
    HostEnvironment::with_config(DeviceKind::Cpu, config).unwrap()
}

fn below_threshold() -> HostProgram {
    HostProgram::new().kernel("below_threshold", |inv| {
        let i = inv.id();
        let keep = inv.buffer(0).load_i32(i) < 0;
        inv.buffer(1).store_u32(i, keep as u32);
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pin_then_read_returns_input(values in prop::collection::vec(any::<i32>(), 0..300)) {
        let env = host();
        let buffer = DeviceBuffer::from_slice(&env, &values).unwrap();
        prop_assert_eq!(buffer.to_vec::<i32>(&env).unwrap(), values);
    }

    #[test]
    fn presence_matches_host_predicate(values in prop::collection::vec(-50i32..50, 0..300)) {
        let env = host();
        let task = Task::build(&env, &below_threshold(), "below_threshold").unwrap();
        let buffer = DeviceBuffer::from_slice(&env, &values).unwrap();

        let presence = compute_presence_array(&env, &buffer, &task).unwrap();

        let expected: Vec<u32> = values.iter().map(|&v| (v < 0) as u32).collect();
        prop_assert_eq!(presence.to_vec::<u32>(&env).unwrap(), expected);
    }

    #[test]
    fn scan_is_exclusive(flags in prop::collection::vec(0u32..=1, 1..500)) {
        let env = host();
        let presence = DeviceBuffer::from_slice(&env, &flags).unwrap();

        let scan = exclusive_prefix_sum(&env, &presence).unwrap().to_vec::<u32>(&env).unwrap();

        prop_assert_eq!(scan[0], 0);
        for i in 1..flags.len() {
            prop_assert_eq!(scan[i], scan[i - 1] + flags[i - 1]);
        }
    }

    #[test]
    fn filtered_length_counts_ones(flags in prop::collection::vec(0u32..=1, 0..500)) {
        let env = host();
        let presence = DeviceBuffer::from_slice(&env, &flags).unwrap();
        let scan = exclusive_prefix_sum(&env, &presence).unwrap();

        let ones = flags.iter().filter(|&&f| f == 1).count();
        prop_assert_eq!(filtered_buffer_length(&env, &presence, &scan).unwrap(), ones);
    }

    #[test]
    fn compaction_keeps_flagged_elements_in_order(
        pairs in prop::collection::vec((any::<i32>(), any::<bool>()), 0..300)
    ) {
        let env = host();
        let values: Vec<i32> = pairs.iter().map(|p| p.0).collect();
        let flags: Vec<u32> = pairs.iter().map(|p| p.1 as u32).collect();
        let dataset = DeviceBuffer::from_slice(&env, &values).unwrap();
        let presence = DeviceBuffer::from_slice(&env, &flags).unwrap();
        let scan = exclusive_prefix_sum(&env, &presence).unwrap();

        let output = filter_by_scattered_writes(&env, &dataset, &presence, &scan).unwrap();

        let expected: Vec<i32> = pairs.iter().filter(|p| p.1).map(|p| p.0).collect();
        prop_assert_eq!(output.to_vec::<i32>(&env).unwrap(), expected);
    }

    #[test]
    fn bitonic_sort_orders_and_is_idempotent(
        power in 0u32..10,
        seed in prop::collection::vec(any::<i32>(), 512)
    ) {
        let env = host();
        let comparator = Task::build(&env, &bitonic_sort_i32_program(), "bitonic_sort_i32").unwrap();
        let values = &seed[..1 << power];
        let buffer = DeviceBuffer::from_slice(&env, values).unwrap();

        integer_bitonic_sort(&env, &buffer, &comparator).unwrap();
        let once = buffer.to_vec::<i32>(&env).unwrap();
        integer_bitonic_sort(&env, &buffer, &comparator).unwrap();
        let twice = buffer.to_vec::<i32>(&env).unwrap();

        let mut expected = values.to_vec();
        expected.sort_unstable();
        prop_assert_eq!(&once, &expected);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sum_matches_host(values in prop::collection::vec(-100_000i32..100_000, 0..1000)) {
        let env = host();
        let buffer = DeviceBuffer::from_slice(&env, &values).unwrap();

        let total = sum_integer_dataset(&env, &buffer, &reduce_sum_program()).unwrap();

        prop_assert_eq!(total, values.iter().sum::<i32>());
    }
}
