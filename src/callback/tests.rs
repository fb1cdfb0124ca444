//! Test suite for the callback module
//!
//! Backends here use synthetic tables; blocks are built by hand the way a
//! native caller would have spilled them.

use super::*;
use crate::interop::{
    ScalarKind, TypeDesc, Value, FLOAT_REGISTER_COUNT, INT_REGISTER_COUNT, MAX_FRAME_WORDS,
    TRAMPOLINE_ENTRY_STRIDE,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::HashMap;
use std::ffi::CString;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BASE: usize = 0x7000_0000;

fn backend(capacity: usize) -> TrampolineBackend {
    TrampolineBackend::new(EntryTable::new(BASE, TRAMPOLINE_ENTRY_STRIDE), capacity)
}

/// Block with integer register `n` at word FLOAT_REGISTER_COUNT + n
fn int_block(args: &[usize]) -> Vec<usize> {
    let mut words = vec![0; MAX_FRAME_WORDS];
    words[FLOAT_REGISTER_COUNT..FLOAT_REGISTER_COUNT + args.len()].copy_from_slice(args);
    words
}

fn call(backend: &TrampolineBackend, address: usize, words: &[usize]) -> Option<usize> {
    backend
        .dispatch_address(address, &ArgBlock::from_words(words))
        .unwrap()
}

#[test]
fn test_register_returns_table_entry() {
    let b = backend(4);
    let address = b.register(Callback::new(|a: i32, b: i32| a + b)).unwrap();

    assert!(address >= BASE);
    assert_eq!((address - BASE) % TRAMPOLINE_ENTRY_STRIDE, 0);
    assert!((address - BASE) / TRAMPOLINE_ENTRY_STRIDE < 4);
    assert_eq!(b.live(), 1);
    assert_eq!(b.capacity(), 4);

    assert_eq!(call(&b, address, &int_block(&[40, 2])), Some(42));
}

#[test]
fn test_plain_registration_never_dedups() {
    let b = backend(4);
    let first = b.register(Callback::new(|| 1i32)).unwrap();
    let second = b.register(Callback::new(|| 1i32)).unwrap();
    assert_ne!(first, second);
    assert_eq!(b.live(), 2);
}

#[test]
fn test_shared_registration_dedups() {
    let b = backend(4);
    let cb = Callback::new(|x: u32| x + 1).shared();

    let first = b.register_shared(&cb).unwrap();
    let second = b.register_shared(&cb).unwrap();
    assert_eq!(first, second);
    assert_eq!(b.live(), 1);

    let other = Callback::new(|x: u32| x + 1).shared();
    assert_ne!(b.register_shared(&other).unwrap(), first);
    assert_eq!(b.live(), 2);
}

#[test]
fn test_double_unregister_fails() {
    let b = backend(2);
    let address = b.register(Callback::new(|| ())).unwrap();

    assert_eq!(b.unregister(address), Ok(()));
    assert_eq!(
        b.unregister(address),
        Err(CallbackError::CallbackNotFound(Lookup::Address(address)))
    );
    assert_eq!(b.live(), 0);
}

#[test]
fn test_unregister_unknown_address() {
    let b = backend(2);
    assert_eq!(
        b.unregister(0x1234),
        Err(CallbackError::CallbackNotFound(Lookup::Address(0x1234)))
    );
}

#[test]
fn test_unregister_shared() {
    let b = backend(2);
    let cb = Callback::new(|x: i64| x).shared();
    let address = b.register_shared(&cb).unwrap();

    assert_eq!(b.unregister_shared(&cb), Ok(()));
    assert_eq!(
        b.unregister_shared(&cb),
        Err(CallbackError::CallbackNotFound(Lookup::Identity(identity_of(&cb))))
    );
    assert_eq!(b.registry().lookup_by_address(address), None);

    // A new registration may land anywhere, including the freed slot
    let again = b.register_shared(&cb).unwrap();
    assert_eq!(b.registry().lookup_by_identity(identity_of(&cb)), Some(again));
}

#[test]
fn test_unregister_by_address_purges_dedup() {
    let b = backend(2);
    let cb = Callback::new(|| 7u8).shared();
    let address = b.register_shared(&cb).unwrap();

    b.unregister(address).unwrap();
    assert_eq!(b.registry().lookup_by_identity(identity_of(&cb)), None);
    assert!(matches!(
        b.unregister_shared(&cb),
        Err(CallbackError::CallbackNotFound(Lookup::Identity(_)))
    ));
}

#[test]
fn test_capacity_exceeded_keeps_prior_callbacks() {
    let b = backend(3);
    let addresses: Vec<usize> = (0..3usize)
        .map(|i| b.register(Callback::new(move |x: usize| x + i)).unwrap())
        .collect();

    assert_eq!(
        b.register(Callback::new(|| ())),
        Err(CallbackError::CapacityExceeded { capacity: 3 })
    );
    assert_eq!(b.live(), 3);

    let mut unique = addresses.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), 3);

    for (i, &address) in addresses.iter().enumerate() {
        assert_eq!(call(&b, address, &int_block(&[100])), Some(100 + i));
    }

    b.unregister(addresses[1]).unwrap();
    assert!(b.register(Callback::new(|| ())).is_ok());
}

#[test]
fn test_shared_dedup_at_capacity() {
    let b = backend(1);
    let cb = Callback::new(|| 1u16).shared();
    let address = b.register_shared(&cb).unwrap();
    // Full, but the identity is already bound
    assert_eq!(b.register_shared(&cb), Ok(address));
}

#[test]
fn test_unsupported_parameter_consumes_no_slot() {
    let b = backend(2);
    let cb = Callback::dynamic(
        vec![ScalarKind::I32.into(), TypeDesc::Struct("Point")],
        vec![],
        |_| None,
    );

    assert_eq!(
        b.register(cb),
        Err(CallbackError::UnsupportedArgumentType {
            index: 1,
            found: TypeDesc::Struct("Point"),
        })
    );
    assert_eq!(b.live(), 0);

    for desc in [
        TypeDesc::I128,
        TypeDesc::Complex128,
        TypeDesc::Slice,
        TypeDesc::Map,
        TypeDesc::Function,
        TypeDesc::Channel,
        TypeDesc::Interface,
        TypeDesc::Array,
    ] {
        let cb = Callback::dynamic(vec![desc], vec![], |_| None);
        assert!(matches!(
            b.register(cb),
            Err(CallbackError::UnsupportedArgumentType { index: 0, .. })
        ));
    }
    assert_eq!(b.live(), 0);
}

#[test]
fn test_unsupported_returns() {
    let b = backend(2);

    let two = Callback::dynamic(
        vec![],
        vec![ScalarKind::I32.into(), ScalarKind::I32.into()],
        |_| None,
    );
    assert_eq!(
        b.register(two),
        Err(CallbackError::UnsupportedReturnArity { count: 2 })
    );

    for found in [
        TypeDesc::Scalar(ScalarKind::F64),
        TypeDesc::Scalar(ScalarKind::F32),
        TypeDesc::Scalar(ScalarKind::CString),
        TypeDesc::U128,
        TypeDesc::Struct("Pair"),
    ] {
        let cb = Callback::dynamic(vec![], vec![found], |_| None);
        assert_eq!(
            b.register(cb),
            Err(CallbackError::UnsupportedReturnType { found })
        );
    }
    assert_eq!(b.live(), 0);
}

#[test]
fn test_too_many_parameters() {
    let params = vec![TypeDesc::Scalar(ScalarKind::I64); MAX_FRAME_WORDS];
    let cb = Callback::dynamic(params, vec![], |_| None);
    assert_eq!(
        Signature::of(&cb),
        Err(CallbackError::TooManyParameters {
            count: MAX_FRAME_WORDS
        })
    );
}

#[test]
fn test_bool_result_is_zero_or_one() {
    let b = backend(2);
    let address = b.register(Callback::new(|x: i32| x > 0)).unwrap();

    assert_eq!(call(&b, address, &int_block(&[5])), Some(1));
    assert_eq!(call(&b, address, &int_block(&[(-5i32) as u32 as usize])), Some(0));
    assert_eq!(call(&b, address, &int_block(&[0])), Some(0));
}

#[test]
fn test_bool_argument_reads_low_byte() {
    let b = backend(1);
    let address = b.register(Callback::new(|flag: bool| flag as u8)).unwrap();
    assert_eq!(call(&b, address, &int_block(&[0xff01])), Some(1));
    assert_eq!(call(&b, address, &int_block(&[0xff00])), Some(0));
}

#[test]
fn test_signed_results_are_sign_extended() {
    let b = backend(2);
    let neg = b.register(Callback::new(|| -1i8)).unwrap();
    let wide = b.register(Callback::new(|| u32::MAX)).unwrap();

    assert_eq!(call(&b, neg, &int_block(&[])), Some(usize::MAX));
    assert_eq!(call(&b, wide, &int_block(&[])), Some(u32::MAX as usize));
}

#[test]
fn test_nine_ints_then_nine_floats() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let mut params = vec![TypeDesc::Scalar(ScalarKind::I64); 9];
    params.extend(vec![TypeDesc::Scalar(ScalarKind::F64); 9]);
    let cb = Callback::dynamic(params, vec![], move |args| {
        *sink.lock() = args;
        None
    });

    let b = backend(1);
    let address = b.register(cb).unwrap();

    // Integers 1..=9, floats 0.5..=4.5. Both conventions put integer n
    // (1-based) at word 7 + n and spill the ninth float right after them.
    let mut words = vec![0; MAX_FRAME_WORDS];
    for n in 1..=9usize {
        words[7 + n] = (n as i64 * -1000) as usize;
    }
    for n in 1..=8usize {
        words[n - 1] = (n as f64 * 0.5).to_bits() as usize;
    }
    words[17] = 4.5f64.to_bits() as usize;

    assert_eq!(call(&b, address, &words), None);

    let args = seen.lock().clone();
    let mut expected: Vec<Value> = (1..=9).map(|n| Value::I64(n * -1000)).collect();
    expected.extend((1..=9).map(|n| Value::F64(n as f64 * 0.5)));
    assert_eq!(args, expected);
}

#[cfg(target_arch = "x86_64")]
#[test]
fn test_stack_order_follows_declaration() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    // f64 x9 then i32 x7: the ninth float spills before the seventh int
    let mut params = vec![TypeDesc::Scalar(ScalarKind::F64); 9];
    params.extend(vec![TypeDesc::Scalar(ScalarKind::I32); 7]);
    let cb = Callback::dynamic(params, vec![], move |args| {
        *sink.lock() = args;
        None
    });

    let b = backend(1);
    let address = b.register(cb).unwrap();

    let mut words = vec![0; MAX_FRAME_WORDS];
    for n in 0..8 {
        words[n] = (n as f64).to_bits() as usize;
    }
    for n in 0..6 {
        words[8 + n] = 100 + n;
    }
    words[14] = 8.0f64.to_bits() as usize;
    words[15] = 106;

    call(&b, address, &words);

    let mut expected: Vec<Value> = (0..9).map(|n| Value::F64(n as f64)).collect();
    expected.extend((100..107).map(Value::I32));
    assert_eq!(*seen.lock(), expected);
}

#[test]
fn test_typed_closure_mixed_kinds() {
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);

    let b = backend(1);
    let address = b
        .register(Callback::new(move |a: u8, x: f32, b: i16, p: *mut u8| {
            *sink.lock() = Some((a, x, b, p as usize));
            a as i64 + b as i64
        }))
        .unwrap();

    let mut words = int_block(&[0x1_07, (-3i16) as u16 as usize, 0xabc0]);
    words[0] = 2.25f32.to_bits() as usize;

    assert_eq!(call(&b, address, &words), Some(4));
    assert_eq!(*seen.lock(), Some((7, 2.25, -3, 0xabc0)));
}

#[test]
fn test_string_parameter() {
    let seen = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&seen);

    let b = backend(1);
    let address = b
        .register(Callback::new(move |s: String| {
            let len = s.len();
            *sink.lock() = s;
            len
        }))
        .unwrap();

    let text = CString::new("trampoline").unwrap();
    assert_eq!(
        call(&b, address, &int_block(&[text.as_ptr() as usize])),
        Some(10)
    );
    assert_eq!(*seen.lock(), "trampoline");

    // Null decodes to the empty string
    assert_eq!(call(&b, address, &int_block(&[0])), Some(0));
}

#[test]
fn test_void_callback_writes_no_result() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let b = backend(1);
    let address = b
        .register(Callback::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

    assert_eq!(call(&b, address, &int_block(&[])), None);
    assert_eq!(call(&b, address, &int_block(&[])), None);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn test_undeclared_result_is_dropped() {
    let b = backend(1);
    let cb = Callback::dynamic(vec![], vec![], |_| Some(Value::I32(9)));
    let address = b.register(cb).unwrap();
    assert_eq!(call(&b, address, &int_block(&[])), None);
}

#[test]
#[should_panic(expected = "declared a i32 result")]
fn test_mismatched_result_is_an_invariant_violation() {
    let b = backend(1);
    let cb = Callback::dynamic(vec![], vec![ScalarKind::I32.into()], |_| {
        Some(Value::I64(1))
    });
    let address = b.register(cb).unwrap();
    call(&b, address, &int_block(&[]));
}

#[test]
fn test_dispatch_unbound_slot() {
    let b = backend(2);
    let block = int_block(&[]);
    assert_eq!(
        b.dispatch(1, &ArgBlock::from_words(&block)),
        Err(CallbackError::SlotNotBound { slot: 1 })
    );
    assert_eq!(
        b.dispatch(99, &ArgBlock::from_words(&block)),
        Err(CallbackError::SlotNotBound { slot: 99 })
    );
}

#[test]
fn test_callback_may_register_callbacks() {
    let b = Arc::new(backend(4));
    let inner = Arc::clone(&b);

    let address = b
        .register(Callback::new(move || {
            let nested = inner.register(Callback::new(|| 5u64)).unwrap();
            inner.unregister(nested).unwrap();
            nested
        }))
        .unwrap();

    let nested = call(&b, address, &int_block(&[])).unwrap();
    assert_ne!(nested, address);
    assert_eq!(b.live(), 1);
}

#[test]
fn test_concurrent_registration() {
    let b = Arc::new(backend(64));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let b = Arc::clone(&b);
            std::thread::spawn(move || {
                (0..8usize)
                    .map(|i| b.register(Callback::new(move || t * 100 + i)).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all: Vec<usize> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(b.live(), 64);
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), 64);
    assert!(b.register(Callback::new(|| ())).is_err());
}

#[test]
fn test_registry_release_slot() {
    let registry = Registry::with_capacity(2);
    let table = EntryTable::new(BASE, TRAMPOLINE_ENTRY_STRIDE);
    let address = compile(&registry, &table, Callback::new(|| ()).shared(), None).unwrap();
    let slot = registry.lookup_by_address(address).unwrap();

    assert_eq!(table.entry(slot), address);
    assert_eq!(registry.release(slot), Ok(()));
    assert_eq!(
        registry.release(slot),
        Err(CallbackError::SlotNotBound { slot })
    );
    assert!(registry.binding(slot).is_none());
}

#[test]
#[should_panic(expected = "capacity must be at least 1")]
fn test_zero_capacity_is_fatal() {
    Registry::with_capacity(0);
}

#[test]
fn test_entry_table_geometry() {
    let table = EntryTable::new(0x1000, 8);
    assert_eq!(table.entry(0), 0x1000);
    assert_eq!(table.entry(3), 0x1018);
    assert_eq!(native_table().stride(), TRAMPOLINE_ENTRY_STRIDE);
    assert_ne!(native_table().base(), 0);
}

#[test]
fn test_signature_of_typed_closure() {
    let cb = Callback::new(|_: i8, _: f64, _: String, _: *const u8| true);
    let sig = Signature::of(&cb).unwrap();
    assert_eq!(
        sig.params(),
        &[
            ScalarKind::I8,
            ScalarKind::F64,
            ScalarKind::CString,
            ScalarKind::Pointer
        ]
    );
    assert_eq!(sig.ret(), Some(ScalarKind::Bool));
}

#[test]
fn test_error_display() {
    let err = CallbackError::UnsupportedArgumentType {
        index: 2,
        found: TypeDesc::Map,
    };
    assert_eq!(err.to_string(), "Unsupported argument type for parameter 2: map");
    assert_eq!(
        CallbackError::CapacityExceeded { capacity: 2000 }.to_string(),
        "The maximum number of callbacks (2000) has been reached"
    );
}

// ============================================================================
// Host backend
// ============================================================================

#[derive(Default)]
struct MockHost {
    next: AtomicUsize,
    bound: Mutex<HashMap<usize, Arc<Binding>>>,
}

impl MockHost {
    fn invoke(&self, address: usize, words: &[usize]) -> Option<usize> {
        let binding = self.bound.lock().get(&address).cloned().unwrap();
        binding.invoke(&ArgBlock::from_words(words))
    }
}

impl HostRegistrar for MockHost {
    fn register(&self, binding: Arc<Binding>) -> Result<usize, CallbackError> {
        let address = 0x9000 + 16 * self.next.fetch_add(1, Ordering::SeqCst);
        self.bound.lock().insert(address, binding);
        Ok(address)
    }

    fn unregister(&self, address: usize) -> Result<(), CallbackError> {
        self.bound
            .lock()
            .remove(&address)
            .map(drop)
            .ok_or(CallbackError::CallbackNotFound(Lookup::Address(address)))
    }

    fn capacity(&self) -> usize {
        2
    }
}

#[test]
fn test_host_backend_contract() {
    let b = HostBackend::new(MockHost::default());
    let cb = Callback::new(|a: i32, b: i32| a * b).shared();

    let address = b.register_shared(&cb).unwrap();
    assert_eq!(b.register_shared(&cb), Ok(address));
    assert_eq!(b.live(), 1);
    assert_eq!(b.host().invoke(address, &int_block(&[6, 7])), Some(42));

    assert_eq!(b.unregister_shared(&cb), Ok(()));
    assert!(matches!(
        b.unregister_shared(&cb),
        Err(CallbackError::CallbackNotFound(Lookup::Identity(_)))
    ));
    assert_eq!(
        b.unregister(address),
        Err(CallbackError::CallbackNotFound(Lookup::Address(address)))
    );
    assert_eq!(b.live(), 0);
}

#[test]
fn test_host_backend_capacity_and_validation() {
    let b = HostBackend::new(MockHost::default());
    assert_eq!(b.capacity(), 2);

    let rejected = Callback::dynamic(vec![TypeDesc::Slice], vec![], |_| None);
    assert!(matches!(
        b.register(rejected),
        Err(CallbackError::UnsupportedArgumentType { index: 0, .. })
    ));

    let first = b.register(Callback::new(|| ())).unwrap();
    b.register(Callback::new(|| ())).unwrap();
    assert_eq!(
        b.register(Callback::new(|| ())),
        Err(CallbackError::CapacityExceeded { capacity: 2 })
    );

    b.unregister(first).unwrap();
    assert!(b.register(Callback::new(|| ())).is_ok());
}

#[test]
fn test_host_capacity_under_contention() {
    struct SlowHost(MockHost);
    impl HostRegistrar for SlowHost {
        fn register(&self, binding: Arc<Binding>) -> Result<usize, CallbackError> {
            std::thread::sleep(std::time::Duration::from_millis(20));
            self.0.register(binding)
        }
        fn unregister(&self, address: usize) -> Result<(), CallbackError> {
            self.0.unregister(address)
        }
        fn capacity(&self) -> usize {
            self.0.capacity()
        }
    }

    let b = Arc::new(HostBackend::new(SlowHost(MockHost::default())));
    let barrier = Arc::new(std::sync::Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let b = Arc::clone(&b);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                b.register(Callback::new(|| 1u32))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| *err == CallbackError::CapacityExceeded { capacity: 2 }));
    assert_eq!(b.live(), 2);
    assert_eq!(b.host().0.bound.lock().len(), 2);
}

#[test]
fn test_default_host_capacity() {
    struct Minimal;
    impl HostRegistrar for Minimal {
        fn register(&self, _: Arc<Binding>) -> Result<usize, CallbackError> {
            Err(CallbackError::Host("unavailable".into()))
        }
        fn unregister(&self, address: usize) -> Result<(), CallbackError> {
            Err(CallbackError::CallbackNotFound(Lookup::Address(address)))
        }
    }

    let b = HostBackend::new(Minimal);
    assert_eq!(b.capacity(), HOST_MAX_CALLBACKS);
    assert_eq!(
        b.register(Callback::new(|| ())),
        Err(CallbackError::Host("unavailable".into()))
    );
    assert_eq!(b.live(), 0);
}

// ============================================================================
// Round trips through the invoker
// ============================================================================

fn echo(b: &TrampolineBackend, kind: ScalarKind) -> (usize, Arc<Mutex<Option<Value>>>) {
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let cb = Callback::dynamic(vec![kind.into()], vec![], move |mut args| {
        *sink.lock() = args.pop();
        None
    });
    (b.register(cb).unwrap(), seen)
}

proptest! {
    #[test]
    fn prop_signed_results_round_trip(v in any::<i32>()) {
        let b = backend(1);
        let address = b.register(Callback::new(|x: i32| x)).unwrap();
        let word = call(&b, address, &int_block(&[v as u32 as usize])).unwrap();
        prop_assert_eq!(word, v as isize as usize);
    }

    #[test]
    fn prop_i64_register_and_stack(v in any::<i64>(), position in 0usize..12) {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let params = vec![TypeDesc::Scalar(ScalarKind::I64); position + 1];
        let cb = Callback::dynamic(params, vec![], move |mut args| {
            *sink.lock() = args.pop();
            None
        });

        let b = backend(1);
        let address = b.register(cb).unwrap();

        let mut words = vec![0; MAX_FRAME_WORDS];
        let index = if position < INT_REGISTER_COUNT {
            FLOAT_REGISTER_COUNT + position
        } else {
            FLOAT_REGISTER_COUNT + INT_REGISTER_COUNT + (position - INT_REGISTER_COUNT)
        };
        words[index] = v as usize;
        call(&b, address, &words);

        prop_assert_eq!(seen.lock().clone(), Some(Value::I64(v)));
    }

    #[test]
    fn prop_f64_round_trip(v in any::<f64>().prop_filter("nan", |v| !v.is_nan())) {
        let b = backend(1);
        let (address, seen) = echo(&b, ScalarKind::F64);
        let mut words = vec![0; MAX_FRAME_WORDS];
        words[0] = v.to_bits() as usize;
        call(&b, address, &words);
        prop_assert_eq!(seen.lock().clone(), Some(Value::F64(v)));
    }

    #[test]
    fn prop_f32_round_trip(v in any::<f32>().prop_filter("nan", |v| !v.is_nan())) {
        let b = backend(1);
        let (address, seen) = echo(&b, ScalarKind::F32);
        let mut words = vec![0; MAX_FRAME_WORDS];
        words[0] = v.to_bits() as usize;
        call(&b, address, &words);
        prop_assert_eq!(seen.lock().clone(), Some(Value::F32(v)));
    }

    #[test]
    fn prop_narrow_integers(v in any::<i16>(), u in any::<u8>()) {
        let b = backend(2);
        let (signed, seen_signed) = echo(&b, ScalarKind::I16);
        let (unsigned, seen_unsigned) = echo(&b, ScalarKind::U8);

        call(&b, signed, &int_block(&[v as isize as usize]));
        call(&b, unsigned, &int_block(&[u as usize | 0xff00]));

        prop_assert_eq!(seen_signed.lock().clone(), Some(Value::I16(v)));
        prop_assert_eq!(seen_unsigned.lock().clone(), Some(Value::U8(u)));
    }
}
