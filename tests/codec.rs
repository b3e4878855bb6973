// Key and data values checked against declared widths and match kinds.
mod support;

use anyhow::Result;
use serde_json::json;
use tdi_catalog::{DataValue, KeyFieldValue, Status, TableApi};

use support::{
    ACL_ID, ECMP_ID, FORWARD_ID, MIRROR_ID, PORT_COUNTER_ID, SET_PORT_ID, document,
    fixture_device, parse, table,
};

const SRC: u32 = 1;
const DST_LPM: u32 = 2;
const L4_PORT: u32 = 3;
const VLAN_VALID: u32 = 4;
const PRIORITY: u32 = 5;
const MEMBER_ID: u32 = 65537;
const GROUP_ID: u32 = 65538;
const COUNTER_PKTS: u32 = 65553;

#[test]
fn each_match_kind_reads_back_what_was_set() -> Result<()> {
    let device = fixture_device()?;
    let acl = device.tdi_info("switch")?.table_from_id(ACL_ID)?;
    let mut key = acl.key_allocate()?;

    let cases = [
        (SRC, KeyFieldValue::ternary(0x0a00_0000, 0xff00_0000)),
        (DST_LPM, KeyFieldValue::lpm(0xc0a8_0100, 24)),
        (L4_PORT, KeyFieldValue::range(1024, 2047)),
        (VLAN_VALID, KeyFieldValue::optional(1, true)),
        (PRIORITY, KeyFieldValue::exact(10)),
    ];
    for (id, value) in cases {
        key.set_value(id, value.clone())?;
        let mut read = value.clone();
        key.get_value(id, &mut read)?;
        assert_eq!(read, value, "field {id}");
    }
    assert!(key.missing_mandatory().is_empty());

    let mut as_bytes = KeyFieldValue::ternary_bytes(vec![0; 4], vec![0; 4]);
    key.get_value(SRC, &mut as_bytes)?;
    assert_eq!(
        as_bytes,
        KeyFieldValue::ternary_bytes(vec![0x0a, 0, 0, 0], vec![0xff, 0, 0, 0])
    );
    Ok(())
}

#[test]
fn match_kind_mismatch_is_rejected_both_ways() -> Result<()> {
    let device = fixture_device()?;
    let acl = device.tdi_info("switch")?.table_from_id(ACL_ID)?;
    let mut key = acl.key_allocate()?;

    let err = key.set_value(SRC, KeyFieldValue::exact(1)).unwrap_err();
    assert_eq!(err.status(), Status::InvalidArgument);
    assert!(err.message().contains("hdr.ip.src"), "{}", err.message());

    key.set_value(SRC, KeyFieldValue::ternary(1, 1))?;
    let mut wrong = KeyFieldValue::lpm(0, 0);
    let err = key.get_value(SRC, &mut wrong).unwrap_err();
    assert_eq!(err.status(), Status::InvalidArgument);
    Ok(())
}

#[test]
fn scalar_width_boundary() -> Result<()> {
    let device = fixture_device()?;
    let catalog = device.tdi_info("switch")?;
    let forward = catalog.table_from_id(FORWARD_ID)?;
    let mut key = forward.key_allocate()?;

    key.set_value(1, KeyFieldValue::exact((1 << 32) - 1))?;
    let err = key.set_value(1, KeyFieldValue::exact(1 << 32)).unwrap_err();
    assert_eq!(err.status(), Status::InvalidArgument);

    let acl = catalog.table_from_id(ACL_ID)?;
    let mut data = acl.data_allocate_for_action(MIRROR_ID)?;
    data.set_value(1, DataValue::U64((1 << 10) - 1))?;
    let err = data.set_value(1, DataValue::U64(1 << 10)).unwrap_err();
    assert_eq!(err.status(), Status::InvalidArgument);
    Ok(())
}

#[test]
fn byte_arrays_must_match_width_and_are_masked() -> Result<()> {
    let device = fixture_device()?;
    let catalog = device.tdi_info("switch")?;
    let forward = catalog.table_from_id(FORWARD_ID)?;
    let mut key = forward.key_allocate()?;

    for len in [3, 5] {
        let err = key
            .set_value(1, KeyFieldValue::exact_bytes(vec![0; len]))
            .unwrap_err();
        assert_eq!(err.status(), Status::InvalidArgument, "{len} bytes");
    }

    let mut data = forward.data_allocate_for_action(SET_PORT_ID)?;
    data.set_value(1, DataValue::Bytes(vec![0xff, 0xff]))?;
    assert_eq!(data.get_value(1)?, DataValue::Bytes(vec![0x01, 0xff]));
    assert_eq!(data.get_u64(1)?, 0x1ff);
    Ok(())
}

#[test]
fn lpm_prefix_and_range_order_are_checked() -> Result<()> {
    let device = fixture_device()?;
    let acl = device.tdi_info("switch")?.table_from_id(ACL_ID)?;
    let mut key = acl.key_allocate()?;

    key.set_value(DST_LPM, KeyFieldValue::lpm(0, 32))?;
    let err = key.set_value(DST_LPM, KeyFieldValue::lpm(0, 33)).unwrap_err();
    assert_eq!(err.status(), Status::InvalidArgument);

    let err = key
        .set_value(L4_PORT, KeyFieldValue::range(2000, 1000))
        .unwrap_err();
    assert_eq!(err.status(), Status::InvalidArgument);
    Ok(())
}

#[test]
fn unset_fields_read_as_zero_or_default() -> Result<()> {
    let device = fixture_device()?;
    let catalog = device.tdi_info("switch")?;
    let acl = catalog.table_from_id(ACL_ID)?;

    let key = acl.key_allocate()?;
    let mut read = KeyFieldValue::range_bytes(vec![9, 9], vec![9, 9]);
    key.get_value(L4_PORT, &mut read)?;
    assert_eq!(read, KeyFieldValue::range_bytes(vec![0, 0], vec![0, 0]));
    assert_eq!(key.missing_mandatory(), vec![PRIORITY]);

    let data = acl.data_allocate_for_action(MIRROR_ID)?;
    assert_eq!(data.get_u64(1)?, 1);
    assert_eq!(data.get_value(COUNTER_PKTS)?, DataValue::U64(0));
    Ok(())
}

#[test]
fn active_field_tracking() -> Result<()> {
    let device = fixture_device()?;
    let ecmp = device.tdi_info("switch")?.table_from_id(ECMP_ID)?;

    let mut data = ecmp.data_allocate()?;
    assert!(data.is_active(MEMBER_ID) && data.is_active(GROUP_ID));
    data.set_value(MEMBER_ID, DataValue::U64(3))?;
    assert!(!data.is_active(GROUP_ID));
    assert_eq!(
        data.get_value(GROUP_ID).unwrap_err().status(),
        Status::InvalidArgument
    );
    assert_eq!(data.active_fields()?, vec![MEMBER_ID]);

    let mut data = ecmp.data_allocate_with_fields(&[GROUP_ID])?;
    assert!(!data.is_active(MEMBER_ID));
    assert!(data.is_active(GROUP_ID));
    data.remove_active_field(GROUP_ID)?;
    assert!(!data.is_active(GROUP_ID));

    data.reset(None, None, &[])?;
    assert!(data.is_active(MEMBER_ID) && data.is_active(GROUP_ID));
    data.remove_active_field(MEMBER_ID)?;
    assert!(!data.is_active(MEMBER_ID));
    assert!(data.is_active(GROUP_ID));

    let err = data.reset(None, None, &[99]).unwrap_err();
    assert_eq!(err.status(), Status::NotFound);
    Ok(())
}

#[test]
fn read_only_and_type_mismatch_are_rejected() -> Result<()> {
    let device = fixture_device()?;
    let catalog = device.tdi_info("switch")?;
    let acl = catalog.table_from_id(ACL_ID)?;

    let mut data = acl.data_allocate()?;
    let err = data.set_value(COUNTER_PKTS, DataValue::U64(1)).unwrap_err();
    assert_eq!(err.status(), Status::InvalidArgument);

    let forward = catalog.table_from_id(FORWARD_ID)?;
    let mut data = forward.data_allocate_for_action(SET_PORT_ID)?;
    let err = data.set_value(1, DataValue::Bool(true)).unwrap_err();
    assert_eq!(err.status(), Status::InvalidArgument);
    Ok(())
}

#[test]
fn capabilities_follow_the_table_kind() -> Result<()> {
    let device = fixture_device()?;
    let catalog = device.tdi_info("switch")?;
    let forward = catalog.table_from_id(FORWARD_ID)?;
    let counter = catalog.table_from_id(PORT_COUNTER_ID)?;

    assert!(forward.is_api_supported(TableApi::DefaultEntrySet));
    assert!(!counter.is_api_supported(TableApi::DefaultEntrySet));
    assert_eq!(
        counter
            .ensure_supported(TableApi::DefaultEntrySet)
            .unwrap_err()
            .status(),
        Status::NotSupported
    );
    assert!(counter.is_api_supported(TableApi::OperationsExecute));
    assert_eq!(
        counter.data_allocate_for_action(1).unwrap_err().status(),
        Status::NotSupported
    );
    assert_eq!(counter.data_allocate()?.field_ids()?, vec![65553, 65554]);
    Ok(())
}

#[test]
fn learn_data_has_no_parent_table() -> Result<()> {
    let device = fixture_device()?;
    let catalog = device.tdi_info("switch")?;
    let learn = catalog.learn_from_name("pipe.SwitchIngressDeparser.digest")?;

    let mut data = learn.data_allocate()?;
    data.set_value_by_name("is_new", DataValue::Bool(true))?;
    data.set_value_by_name("src_addr", DataValue::Bytes(vec![0, 1, 2, 3, 4, 5]))?;
    assert_eq!(data.get_value(3)?, DataValue::Bool(true));
    assert_eq!(data.get_bytes(2)?, vec![0, 0]);

    assert_eq!(data.parent_learn()?.id(), learn.id());
    assert_eq!(data.parent_table().unwrap_err().status(), Status::NotSupported);
    assert_eq!(
        data.reset(Some(1), None, &[]).unwrap_err().status(),
        Status::NotSupported
    );
    Ok(())
}

#[test]
fn string_key_fields_take_string_values() -> Result<()> {
    let catalog = parse(&[document(vec![table(
        "pipe.port_cfg",
        1,
        vec![json!({
            "id": 1,
            "name": "$PORT_NAME",
            "match_type": "Exact",
            "type": { "type": "string", "choices": ["1/0", "1/1"] }
        })],
    )])])?;
    let table = catalog.table_from_name("port_cfg")?;
    let mut key = table.key_allocate()?;

    key.set_value(1, KeyFieldValue::string("1/1"))?;
    let mut read = KeyFieldValue::string("");
    key.get_value(1, &mut read)?;
    assert_eq!(read, KeyFieldValue::string("1/1"));

    assert_eq!(
        key.set_value(1, KeyFieldValue::string("9/9")).unwrap_err().status(),
        Status::InvalidArgument
    );
    assert_eq!(
        key.set_value(1, KeyFieldValue::exact(1)).unwrap_err().status(),
        Status::InvalidArgument
    );
    Ok(())
}

#[test]
fn wide_fields_only_accept_byte_arrays() -> Result<()> {
    let catalog = parse(&[document(vec![table(
        "pipe.v6",
        1,
        vec![support::exact_key(1, "hdr.ipv6.dst", 128)],
    )])])?;
    let table = catalog.table_from_name("v6")?;
    let mut key = table.key_allocate()?;
    assert_eq!(
        key.set_value(1, KeyFieldValue::exact(1)).unwrap_err().status(),
        Status::InvalidArgument
    );
    let mut addr = vec![0u8; 16];
    addr[0] = 0x20;
    addr[15] = 0x01;
    key.set_value(1, KeyFieldValue::exact_bytes(addr.clone()))?;
    let mut read = KeyFieldValue::exact_bytes(vec![0; 16]);
    key.get_value(1, &mut read)?;
    assert_eq!(read, KeyFieldValue::exact_bytes(addr));
    Ok(())
}
