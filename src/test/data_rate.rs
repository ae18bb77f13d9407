use crate::engine::DataRate;
use crate::sim::SimTime;

#[test]
fn data_rate_parses_bit_and_byte_units() {
    assert_eq!("10Mbps".parse::<DataRate>(), Ok(DataRate::from_mbps(10)));
    assert_eq!("1Gb/s".parse::<DataRate>(), Ok(DataRate::from_gbps(1)));
    assert_eq!("100kbps".parse::<DataRate>(), Ok(DataRate::from_kbps(100)));
    assert_eq!("1.5Mbps".parse::<DataRate>(), Ok(DataRate::from_bps(1_500_000)));
    assert_eq!("1MBps".parse::<DataRate>(), Ok(DataRate::from_mbps(8)));
    assert_eq!("1Kibps".parse::<DataRate>(), Ok(DataRate::from_bps(1024)));
    assert!("fast".parse::<DataRate>().is_err());
    assert!("10Mbits".parse::<DataRate>().is_err());
    assert!("10Xbps".parse::<DataRate>().is_err());
}

#[test]
fn data_rate_display_round_trips_through_parse() {
    for rate in [
        DataRate::from_bps(1_234),
        DataRate::from_kbps(64),
        DataRate::from_mbps(54),
        DataRate::from_gbps(10),
    ] {
        assert_eq!(rate.to_string().parse::<DataRate>(), Ok(rate));
    }
    assert_eq!(DataRate::from_mbps(100).to_string(), "100Mbps");
}

#[test]
fn tx_time_rounds_up_to_whole_nanoseconds() {
    // 1000 字节 @ 10Mbps = 800us
    assert_eq!(
        DataRate::from_mbps(10).tx_time(1000),
        SimTime::from_micros(800)
    );
    // 1 字节 @ 3bps = 8/3 s，向上取整
    assert_eq!(DataRate::from_bps(3).tx_time(1), SimTime(2_666_666_667));
    assert_eq!(DataRate::from_gbps(1).tx_time(0), SimTime::ZERO);
}

#[test]
fn zero_rate_never_finishes_in_practice() {
    assert!(DataRate::from_bps(0).tx_time(1) > SimTime::from_secs(3600 * 24 * 365));
}
