//! Property tests for framing, value encoding and index assignment.

use std::collections::HashSet;

use bytes::{Bytes, BytesMut};
use proptest::prelude::*;
use wrpc_wire::index::matches_any;
use wrpc_wire::protocol::{build_frame, encode_preamble, Frame, FrameBuffer, Header};
use wrpc_wire::value::{
    async_paths, decode_values, encode_stream_chunk, encode_values, StreamDecoder, StreamEvent,
    Type, Value, STREAM_END,
};
use wrpc_wire::Index;

fn arb_index() -> impl Strategy<Value = Index> {
    proptest::collection::vec(0u32..1000, 0..5).prop_map(|path| Index::new(path).unwrap())
}

fn arb_frame() -> impl Strategy<Value = Frame> {
    (arb_index(), proptest::collection::vec(any::<u8>(), 0..64))
        .prop_map(|(path, data)| Frame::new(path, Bytes::from(data)))
}

/// Feed `bytes` to `buffer` in pieces cut at `cuts`.
fn push_split(buffer: &mut FrameBuffer, bytes: &[u8], cuts: &[usize]) -> Vec<Frame> {
    let mut cuts: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    cuts.sort_unstable();
    let mut frames = Vec::new();
    let mut start = 0;
    for cut in cuts.into_iter().chain([bytes.len()]) {
        frames.extend(buffer.push(&bytes[start..cut]).unwrap());
        start = cut;
    }
    frames
}

fn record_type() -> Type {
    Type::Record(vec![
        ("id".into(), Type::U32),
        ("name".into(), Type::String),
        ("samples".into(), Type::List(Box::new(Type::S64))),
        ("flag".into(), Type::Option(Box::new(Type::Bool))),
    ])
}

fn arb_record() -> impl Strategy<Value = Value> {
    (
        any::<u32>(),
        "[a-z0-9 ]{0,24}",
        proptest::collection::vec(any::<i64>(), 0..8),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(|(id, name, samples, flag)| {
            Value::Record(vec![
                Value::U32(id),
                Value::String(name),
                Value::List(samples.into_iter().map(Value::S64).collect()),
                Value::Option(flag.map(|b| Box::new(Value::Bool(b)))),
            ])
        })
}

proptest! {
    /// However the invocation bytes are split across reads, the decoded
    /// header and frames are the same.
    #[test]
    fn frame_buffer_split_invariance(
        instance in "[a-z:/@.]{0,16}",
        name in "[a-z\\[\\]-]{0,16}",
        frames in proptest::collection::vec(arb_frame(), 0..6),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let header = Header::new(instance, name);
        let mut bytes = encode_preamble(&header).unwrap().to_vec();
        for frame in &frames {
            bytes.extend(build_frame(&frame.path, &frame.data).unwrap());
        }

        let mut buffer = FrameBuffer::with_header();
        let decoded = push_split(&mut buffer, &bytes, &cuts);
        prop_assert_eq!(buffer.header(), Some(&header));
        prop_assert_eq!(decoded, frames);
        prop_assert!(buffer.finish().is_ok());
    }

    /// Any non-empty proper prefix of a frame leaves an incomplete record
    /// that `finish` reports.
    #[test]
    fn frame_buffer_truncation_is_eof(frame in arb_frame(), cut in any::<usize>()) {
        let bytes = build_frame(&frame.path, &frame.data).unwrap();
        let cut = 1 + cut % (bytes.len() - 1);

        let mut buffer = FrameBuffer::new();
        prop_assert!(buffer.push(&bytes[..cut]).unwrap().is_empty());
        prop_assert!(buffer.finish().is_err());
    }

    /// Values decode to what was encoded, and never from a strict prefix.
    #[test]
    fn record_encoding_is_prefix_free(value in arb_record(), cut in any::<usize>()) {
        let types = [record_type()];
        let values = [value];
        let encoded = encode_values(&types, &values).unwrap();

        let (decoded, used) = decode_values(&types, &encoded.bytes).unwrap().unwrap();
        prop_assert_eq!(used, encoded.bytes.len());
        prop_assert_eq!(&decoded.values[..], &values[..]);

        let cut = cut % encoded.bytes.len();
        prop_assert!(decode_values(&types, &encoded.bytes[..cut]).unwrap().is_none());
    }

    /// Every pending position of one encoding has a distinct index, and each
    /// is one the receiver declares.
    #[test]
    fn pending_indices_are_unique(streams in 0usize..6, futures in 0usize..6) {
        let types = [
            Type::Tuple(vec![Type::Stream(Box::new(Type::U8)); streams]),
            Type::List(Box::new(Type::Future(Box::new(Type::String)))),
        ];
        let values = [
            Value::Tuple(vec![Value::Stream(None); streams]),
            Value::List(vec![Value::Future(None); futures]),
        ];
        let encoded = encode_values(&types, &values).unwrap();
        prop_assert_eq!(encoded.deferred.len(), streams + futures);

        let paths = async_paths(&types);
        let unique: HashSet<&Index> = encoded.deferred.iter().map(|p| &p.index).collect();
        prop_assert_eq!(unique.len(), encoded.deferred.len());
        for position in &encoded.deferred {
            prop_assert!(matches_any(&position.index, &paths), "{} undeclared", position.index);
        }
    }

    /// The elements read from a stream channel are the concatenation of the
    /// chunks written, regardless of how the bytes arrive.
    #[test]
    fn stream_chunks_concatenate(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..8), 0..6),
        cut in any::<usize>(),
    ) {
        let index = Index::try_from([2]).unwrap();
        let mut bytes = BytesMut::new();
        let mut sent = 0u32;
        for chunk in &chunks {
            let items: Vec<Value> = chunk.iter().copied().map(Value::U8).collect();
            encode_stream_chunk(&Type::U8, &items, &index, sent, &mut bytes, &mut Vec::new()).unwrap();
            sent += items.len() as u32;
        }
        bytes.extend_from_slice(STREAM_END);

        let cut = cut % (bytes.len() + 1);
        let mut decoder = StreamDecoder::new(index, Type::U8);
        let mut events = decoder.push(&bytes[..cut]).unwrap();
        events.extend(decoder.push(&bytes[cut..]).unwrap());

        prop_assert_eq!(events.last(), Some(&StreamEvent::End));
        let received: Vec<Value> = events
            .into_iter()
            .flat_map(|event| match event {
                StreamEvent::Chunk { items, .. } => items,
                StreamEvent::End => Vec::new(),
            })
            .collect();
        let expected: Vec<Value> = chunks.concat().into_iter().map(Value::U8).collect();
        prop_assert_eq!(received, expected);
        prop_assert!(decoder.finish().is_ok());
    }

    #[test]
    fn subject_suffix_roundtrip(index in arb_index()) {
        let suffix = index.subject_suffix();
        prop_assert_eq!(Index::parse_subject_suffix(&suffix).unwrap(), index);
    }
}
