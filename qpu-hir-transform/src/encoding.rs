//! §4.6 ALU instruction encoding: the 64-bit bit-field layout a scheduled [`CombinedOperation`]
//! or single ALU op is packed into, plus the load-immediate word's three payload shapes.
//!
//! This is *not* the binary emitter (out of scope per §1: "the binary emitter that serializes
//! instruction words" is a named external collaborator) — it packs and unpacks the logical
//! fields the scheduler already resolved into the bit positions §4.6's table specifies, the way
//! the teacher's `codegen/masm`'s instruction-word helpers pack a resolved opcode/operand set
//! into the emitter's word format rather than doing register allocation themselves.

use qpu_hir::LoadImmediateKind;

const SIGNALING_SHIFT: u64 = 60;
const UNPACK_SHIFT: u64 = 56;
const PACK_SHIFT: u64 = 52;
const ADD_COND_SHIFT: u64 = 49;
const MUL_COND_SHIFT: u64 = 46;
const SET_FLAGS_SHIFT: u64 = 45;
const WRITE_SWAP_SHIFT: u64 = 44;
const ADD_OUT_SHIFT: u64 = 38;
const MUL_OUT_SHIFT: u64 = 32;
const MUL_OPCODE_SHIFT: u64 = 29;
const ADD_OPCODE_SHIFT: u64 = 24;
const INPUT_A_SHIFT: u64 = 18;
const INPUT_B_SHIFT: u64 = 12;
const ADD_A_MUX_SHIFT: u64 = 9;
const ADD_B_MUX_SHIFT: u64 = 6;
const MUL_A_MUX_SHIFT: u64 = 3;
const MUL_B_MUX_SHIFT: u64 = 0;

const MASK_4: u64 = 0xF;
const MASK_3: u64 = 0x7;
const MASK_1: u64 = 0x1;
const MASK_6: u64 = 0x3F;

/// The logical bit-field contents of one scheduled ALU instruction word (§4.6's table), with
/// every field already resolved by upstream passes (register allocation assigns the file
/// addresses/output registers; this struct only names and packs them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AluWordFields {
    pub signaling: u8,
    pub unpack_mode: u8,
    pub pack_mode: u8,
    pub add_condition_code: u8,
    pub mul_condition_code: u8,
    pub set_flags: bool,
    pub write_swap: bool,
    pub add_output_register: u8,
    pub mul_output_register: u8,
    pub mul_opcode: u8,
    pub add_opcode: u8,
    pub input_a_file_address: u8,
    pub input_b_file_address_or_small_immediate: u8,
    pub add_a_input_mux: u8,
    pub add_b_input_mux: u8,
    pub mul_a_input_mux: u8,
    pub mul_b_input_mux: u8,
}

fn put(word: &mut u64, shift: u64, mask: u64, value: u8) {
    debug_assert!(u64::from(value) <= mask, "field value {value} does not fit its bit width");
    *word |= (u64::from(value) & mask) << shift;
}

fn get(word: u64, shift: u64, mask: u64) -> u8 {
    ((word >> shift) & mask) as u8
}

/// Packs `fields` into the 64-bit word §4.6's table lays out.
pub fn encode_alu_word(fields: &AluWordFields) -> u64 {
    let mut word = 0u64;
    put(&mut word, SIGNALING_SHIFT, MASK_4, fields.signaling);
    put(&mut word, UNPACK_SHIFT, MASK_4, fields.unpack_mode);
    put(&mut word, PACK_SHIFT, MASK_4, fields.pack_mode);
    put(&mut word, ADD_COND_SHIFT, MASK_3, fields.add_condition_code);
    put(&mut word, MUL_COND_SHIFT, MASK_3, fields.mul_condition_code);
    put(&mut word, SET_FLAGS_SHIFT, MASK_1, fields.set_flags as u8);
    put(&mut word, WRITE_SWAP_SHIFT, MASK_1, fields.write_swap as u8);
    put(&mut word, ADD_OUT_SHIFT, MASK_6, fields.add_output_register);
    put(&mut word, MUL_OUT_SHIFT, MASK_6, fields.mul_output_register);
    put(&mut word, MUL_OPCODE_SHIFT, MASK_3, fields.mul_opcode);
    put(&mut word, ADD_OPCODE_SHIFT, 0x1F, fields.add_opcode);
    put(&mut word, INPUT_A_SHIFT, MASK_6, fields.input_a_file_address);
    put(
        &mut word,
        INPUT_B_SHIFT,
        MASK_6,
        fields.input_b_file_address_or_small_immediate,
    );
    put(&mut word, ADD_A_MUX_SHIFT, MASK_3, fields.add_a_input_mux);
    put(&mut word, ADD_B_MUX_SHIFT, MASK_3, fields.add_b_input_mux);
    put(&mut word, MUL_A_MUX_SHIFT, MASK_3, fields.mul_a_input_mux);
    put(&mut word, MUL_B_MUX_SHIFT, MASK_3, fields.mul_b_input_mux);
    word
}

/// Unpacks a 64-bit ALU word back into its logical fields. Round-trips exactly with
/// [`encode_alu_word`] for every field (§8 "Round-trip laws").
pub fn decode_alu_word(word: u64) -> AluWordFields {
    AluWordFields {
        signaling: get(word, SIGNALING_SHIFT, MASK_4),
        unpack_mode: get(word, UNPACK_SHIFT, MASK_4),
        pack_mode: get(word, PACK_SHIFT, MASK_4),
        add_condition_code: get(word, ADD_COND_SHIFT, MASK_3),
        mul_condition_code: get(word, MUL_COND_SHIFT, MASK_3),
        set_flags: get(word, SET_FLAGS_SHIFT, MASK_1) != 0,
        write_swap: get(word, WRITE_SWAP_SHIFT, MASK_1) != 0,
        add_output_register: get(word, ADD_OUT_SHIFT, MASK_6),
        mul_output_register: get(word, MUL_OUT_SHIFT, MASK_6),
        mul_opcode: get(word, MUL_OPCODE_SHIFT, MASK_3),
        add_opcode: get(word, ADD_OPCODE_SHIFT, 0x1F),
        input_a_file_address: get(word, INPUT_A_SHIFT, MASK_6),
        input_b_file_address_or_small_immediate: get(word, INPUT_B_SHIFT, MASK_6),
        add_a_input_mux: get(word, ADD_A_MUX_SHIFT, MASK_3),
        add_b_input_mux: get(word, ADD_B_MUX_SHIFT, MASK_3),
        mul_a_input_mux: get(word, MUL_A_MUX_SHIFT, MASK_3),
        mul_b_input_mux: get(word, MUL_B_MUX_SHIFT, MASK_3),
    }
}

/// A distinguishing top-bits marker a downstream emitter can use to tell a load-immediate word
/// apart from a regular ALU word, set aside from the signaling nibble per §4.6: "distinguished
/// by the top signaling bits".
const LOAD_IMMEDIATE_SIGNALING: u8 = 0b1111;

/// Packs `kind` + `payload` into a load-immediate word: the top signaling nibble marks it as a
/// load-immediate (replacing the opcode+operand bit positions), the next 4 bits carry the load
/// kind tag, and the low 32 bits carry the payload verbatim regardless of kind (the kind only
/// changes how a downstream lowering pass reinterprets those bits — full 32-bit, or two signed
/// shorts, or two unsigned shorts).
pub fn encode_load_immediate_word(kind: LoadImmediateKind, payload: u32) -> u64 {
    let kind_tag: u64 = match kind {
        LoadImmediateKind::FullWidth32 => 0,
        LoadImmediateKind::SignedShortPair => 1,
        LoadImmediateKind::UnsignedShortPair => 2,
    };
    (u64::from(LOAD_IMMEDIATE_SIGNALING) << SIGNALING_SHIFT) | (kind_tag << 32) | u64::from(payload)
}

/// Unpacks a load-immediate word back into its kind and payload. Returns `None` if `word`'s
/// signaling bits don't carry the load-immediate marker.
pub fn decode_load_immediate_word(word: u64) -> Option<(LoadImmediateKind, u32)> {
    if get(word, SIGNALING_SHIFT, MASK_4) != LOAD_IMMEDIATE_SIGNALING {
        return None;
    }
    let kind = match (word >> 32) & MASK_4 {
        0 => LoadImmediateKind::FullWidth32,
        1 => LoadImmediateKind::SignedShortPair,
        2 => LoadImmediateKind::UnsignedShortPair,
        _ => return None,
    };
    Some((kind, word as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> AluWordFields {
        AluWordFields {
            signaling: 0b0101,
            unpack_mode: 0b1010,
            pack_mode: 0b0110,
            add_condition_code: 0b101,
            mul_condition_code: 0b011,
            set_flags: true,
            write_swap: false,
            add_output_register: 0b110011,
            mul_output_register: 0b001100,
            mul_opcode: 0b101,
            add_opcode: 0b11011,
            input_a_file_address: 0b100001,
            input_b_file_address_or_small_immediate: 0b011110,
            add_a_input_mux: 0b110,
            add_b_input_mux: 0b001,
            mul_a_input_mux: 0b010,
            mul_b_input_mux: 0b111,
        }
    }

    #[test]
    fn alu_word_round_trips_every_field() {
        let fields = sample_fields();
        let word = encode_alu_word(&fields);
        assert_eq!(decode_alu_word(word), fields);
    }

    #[test]
    fn alu_word_fields_occupy_disjoint_bit_ranges() {
        // Setting every field to its max value and decoding should recover every field
        // independently: a failure here means two fields overlap in the bit layout.
        let maxed = AluWordFields {
            signaling: 0xF,
            unpack_mode: 0xF,
            pack_mode: 0xF,
            add_condition_code: 0x7,
            mul_condition_code: 0x7,
            set_flags: true,
            write_swap: true,
            add_output_register: 0x3F,
            mul_output_register: 0x3F,
            mul_opcode: 0x7,
            add_opcode: 0x1F,
            input_a_file_address: 0x3F,
            input_b_file_address_or_small_immediate: 0x3F,
            add_a_input_mux: 0x7,
            add_b_input_mux: 0x7,
            mul_a_input_mux: 0x7,
            mul_b_input_mux: 0x7,
        };
        let word = encode_alu_word(&maxed);
        assert_eq!(word, u64::MAX);
        assert_eq!(decode_alu_word(word), maxed);
    }

    #[test]
    fn load_immediate_round_trips_for_each_kind() {
        for kind in [
            LoadImmediateKind::FullWidth32,
            LoadImmediateKind::SignedShortPair,
            LoadImmediateKind::UnsignedShortPair,
        ] {
            let word = encode_load_immediate_word(kind, 0xDEAD_BEEF);
            let (decoded_kind, payload) = decode_load_immediate_word(word).expect("load-immediate marker set");
            assert_eq!(decoded_kind, kind);
            assert_eq!(payload, 0xDEAD_BEEF);
        }
    }

    #[test]
    fn ordinary_alu_word_is_not_mistaken_for_a_load_immediate() {
        let fields = sample_fields();
        let word = encode_alu_word(&fields);
        assert_eq!(decode_load_immediate_word(word), None);
    }
}
