// Shared test fixtures
// Small in-source model and auxiliary files used by the unit tests

/// Four-region toy model: inner core, fluid outer core, two mantle spans and
/// a two-layer crust. Radii in km, coarse on purpose so tests stay fast.
pub(crate) const TOY_MODEL: &str = "\
toy 12 6371.0 6000.0 6336.0 6351.0
0  0.0    13.0 11.2 11.2 3.6 3.6 1.0 100.0 400.0
1  1217.5 12.9 11.1 11.1 3.5 3.5 1.0 100.0 400.0
2  1217.5 12.1 10.3 10.3 0.0 0.0 1.0 100.0 400.0
3  3479.5 9.9  8.0  8.0  0.0 0.0 1.0 100.0 400.0
4  3479.5 5.5  13.7 13.7 7.2 7.2 1.0 100.0 400.0
5  6000.0 3.9  8.9  8.9  4.8 4.8 1.0 100.0 400.0
6  6000.0 3.8  8.6  8.6  4.7 4.7 1.0 100.0 400.0
7  6336.0 3.3  8.0  8.0  4.5 4.5 1.0 100.0 400.0
8  6336.0 2.9  6.5  6.5  3.85 3.85 1.0 100.0 400.0
9  6351.0 2.9  6.5  6.5  3.85 3.85 1.0 100.0 400.0
10 6351.0 2.7  5.8  5.8  3.46 3.46 1.0 100.0 400.0
11 6371.0 2.7  5.8  5.8  3.46 3.46 1.0 100.0 400.0
";

pub(crate) const TOY_GROUPS: &str = "\
Regional: Pg Pb Pn Sg Sb Sn Lg Pup Sup -
Depth: pP sP pS sS pPKP sPKP pPKiKP sPKiKP -
DownWeight: PP SS SP PS PKKP SKKS -
CanUse: P S Pg Pb Pn Sg Sb Sn PKPdf PKPab PKPbc PcP ScS SKSac SKSdf Pup Sup -
Chaff: LR -
P: P Pg Pb Pn Pup PKPdf PKPab PKPbc PKiKP -
PKP: PKPdf PKPab PKPbc -
S: S Sg Sb Sn Sup SKSac SKSdf SKiKP -
SKS: SKSac SKSdf -
";

pub(crate) const TOY_STATS: &str = "\
P 0.0 100.0
1.0 0.70 * 0.666 * 14874.0 *
15.0 0.80 0.80 12000.0
30.0 0.90 * 0.95 * 13000.0 *
90.0 1.05 1.102 12898.0
100.0 1.10 * 1.20 * 12000.0 *
Pg 0.0 10.0
1.0 0.65 * 0.666 * 14874.0 *
10.0 0.72 * 0.70 * 14000.0 *
Pn 0.0 18.0
1.0 0.70 * 0.70 * 9000.0 *
18.0 0.95 * 0.92 * 8200.0 *
S 0.0 100.0
1.0 1.20 * 1.30 * 9000.0 *
100.0 2.10 * 2.40 * 7500.0 *
Sg 0.0 10.0
1.0 1.10 * 1.20 * 8800.0 *
10.0 1.25 * 1.32 * 8100.0 *
Lg 0.0 30.0
1.0 1.50 * 1.60 * 4000.0 *
30.0 2.00 * 2.10 * 2500.0 *
PKPdf 110.0 180.0
110.0 1.10 * 1.30 * 4.0 *
180.0 1.35 * 1.468 * 3.733 *
";

pub(crate) const TOY_ELLIP: &str = "\
P 3 0.0 100.0
0.0 -0.30 -0.28 -0.25 0.10 0.09 0.08 0.02 0.02 0.01
50.0 -0.80 -0.75 -0.70 0.30 0.28 0.25 0.05 0.05 0.04
100.0 -1.20 -1.10 -1.00 0.45 0.42 0.38 0.08 0.07 0.06
S 3 0.0 100.0
0.0 -0.55 -0.50 -0.45 0.18 0.16 0.14 0.03 0.03 0.02
50.0 -1.40 -1.30 -1.20 0.52 0.48 0.44 0.09 0.08 0.07
100.0 -2.10 -1.95 -1.80 0.80 0.74 0.68 0.14 0.13 0.12
Pup 3 0.0 10.0
0.0 -0.10 -0.09 -0.08 0.03 0.03 0.02 0.01 0.01 0.01
5.0 -0.15 -0.14 -0.12 0.05 0.04 0.04 0.01 0.01 0.01
10.0 -0.20 -0.18 -0.16 0.07 0.06 0.05 0.02 0.02 0.01
Sup 3 0.0 10.0
0.0 -0.18 -0.16 -0.14 0.06 0.05 0.04 0.01 0.01 0.01
5.0 -0.27 -0.25 -0.22 0.09 0.08 0.07 0.02 0.02 0.01
10.0 -0.36 -0.33 -0.29 0.12 0.11 0.09 0.03 0.03 0.02
";
